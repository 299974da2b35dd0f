//! Wire types for the compute and networkconnectivity endpoints. Only the
//! fields the IPAM stack reads or writes are modeled; everything else is
//! dropped on deserialization and omitted on serialization so partial bodies
//! work as PATCH payloads.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Network URL, e.g. "projects/p/global/networks/default".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    /// Subnetwork URL, e.g. "projects/p/regions/r/subnetworks/subnet-a".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnetwork: String,

    /// Version token required on interface updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias_ip_ranges: Vec<AliasIpRange>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasIpRange {
    /// A single address as "<ip>/32" or a wider prefix.
    pub ip_cidr_range: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork_range_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnetwork {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Primary CIDR of the subnetwork.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_cidr_range: String,

    /// Version token required on subnetwork patches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_ip_ranges: Vec<SubnetworkSecondaryRange>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetworkSecondaryRange {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub range_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_cidr_range: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_internal_range: Option<String>,
}

/// Compute zonal/regional long-running operation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: String,

    /// PENDING, RUNNING or DONE.
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrors>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// All error messages joined, if the operation carries any.
    pub fn error_message(&self) -> Option<String> {
        let errors = &self.error.as_ref()?.errors;
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationError>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    #[serde(default)]
    pub message: String,
}

/// Network Connectivity internal range reservation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalRange {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Network URL the reservation binds to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<i32>,

    /// Blocks the service may carve the range out of.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_cidr_range: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usage: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// CIDR assigned by the service once the reservation exists.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_cidr_range: String,
}

/// Network Connectivity long-running operation (google.longrunning style).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalOperation {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcStatus>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}

/// Trailing path segment of a resource URL, e.g. the subnetwork name out of
/// "projects/p/regions/r/subnetworks/subnet-a".
pub fn resource_short_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
