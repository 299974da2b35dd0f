use std::collections::HashMap;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Network configuration handed to the plugin on stdin.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    #[serde(
        serialize_with = "crate::serialize_to_string",
        deserialize_with = "crate::deserialize_from_str"
    )]
    pub cni_version: Version,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub plugin_type: String,

    /// Pool to allocate from; defaults to the pool named after the
    /// instance's subnetwork when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_pool_name: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub args: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_config: Option<Value>,

    #[serde(default, rename = "prevResult", skip_serializing_if = "Option::is_none")]
    pub previous_result: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ip {
    #[serde(
        serialize_with = "crate::serialize_to_string",
        deserialize_with = "crate::deserialize_from_str"
    )]
    pub address: IpNetwork,

    pub gateway: IpAddr,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(
        serialize_with = "crate::serialize_to_string",
        deserialize_with = "crate::deserialize_from_str"
    )]
    pub dst: IpNetwork,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<IpAddr>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dns {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_parses_a_typical_ipam_config() {
        let input: Input = serde_json::from_str(
            r#"{
                "cniVersion": "1.0.0",
                "name": "containerd-net",
                "type": "gcp-ipam",
                "ipPoolName": "ippool-subnet-a",
                "prevResult": {"ips": []}
            }"#,
        )
        .unwrap();
        assert_eq!(input.cni_version, Version::new(1, 0, 0));
        assert_eq!(input.plugin_type, "gcp-ipam");
        assert_eq!(input.ip_pool_name.as_deref(), Some("ippool-subnet-a"));
        assert!(input.previous_result.is_some());
    }

    #[test]
    fn pool_name_defaults_to_none() {
        let input: Input =
            serde_json::from_str(r#"{"cniVersion": "0.4.0", "name": "net", "type": "gcp-ipam"}"#)
                .unwrap();
        assert!(input.ip_pool_name.is_none());
        assert!(input.args.is_empty());
    }

    #[test]
    fn ip_serializes_address_as_cidr_string() {
        let ip = Ip {
            address: "10.111.0.1/16".parse().unwrap(),
            gateway: "10.111.0.1".parse().unwrap(),
            interface: None,
        };
        let value = serde_json::to_value(&ip).unwrap();
        assert_eq!(value["address"], "10.111.0.1/16");
        assert_eq!(value["gateway"], "10.111.0.1");
        assert!(value.get("interface").is_none());
    }
}
