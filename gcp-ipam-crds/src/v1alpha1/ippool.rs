use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NAME_GROUP_IPPOOL: &str = "ippools.ipam.gcp-cni.cast.ai";

/// Name of the secondary range used when a pool does not pin one explicitly.
pub const DEFAULT_SECONDARY_RANGE_NAME: &str = "live";

/// Pool name for a subnetwork, derived from its short name.
pub fn pool_name_for_subnetwork(subnetwork: &str) -> String {
    format!("ippool-{subnetwork}")
}

/// A pool of pod IPs drawn from one subnetwork secondary range.
///
/// Cluster-scoped; one per subnetwork. `metadata.resourceVersion` is the
/// optimistic-concurrency token: every writer reads, mutates and writes back
/// with the version it observed, and loses with a conflict if another writer
/// got there first.
#[derive(CustomResource, JsonSchema, Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[kube(
    group = "ipam.gcp-cni.cast.ai",
    version = "v1alpha1",
    kind = "IPPool",
    plural = "ippools",
    status = "IPPoolStatus",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolSpec {
    /// IP range backing this pool, e.g. "10.111.0.0/16".
    pub cidr: String,

    /// Subnetwork URL the pool's secondary range is attached to.
    pub subnet: String,

    /// Name of the secondary range on the subnetwork.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_range_name: Option<String>,

    /// Allocated addresses keyed by dotted-quad IP.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocations: BTreeMap<String, IpAllocation>,
}

#[derive(JsonSchema, Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IpAllocation {
    pub pod_name: String,

    pub pod_namespace: String,

    #[serde(rename = "podUID")]
    pub pod_uid: String,

    /// Node the IP was originally handed out on. Not rewritten when the IP
    /// migrates: the destination never re-allocates and the source's release
    /// is suppressed, so the record keeps naming the source node.
    pub node_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_at: Option<Time>,
}

#[derive(JsonSchema, Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolStatus {
    /// Usable addresses in the CIDR.
    #[serde(default)]
    pub capacity: i64,

    #[serde(default)]
    pub allocated: i64,

    #[serde(default)]
    pub available: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}
