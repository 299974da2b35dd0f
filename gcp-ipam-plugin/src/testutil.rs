//! Builders shared by the driver state-machine tests.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, PodIP, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use gcp_ipam_crds::v1alpha1::ippool::{IPPool, IPPoolSpec};
use gcp_ipam_gce::{
    AliasIpRange, Instance, InstanceIdentity, MockCompute, NetworkInterface, Subnetwork,
};

use crate::context::EventContext;

pub fn pod(namespace: &str, name: &str, annotations: &[(&str, &str)], ip: Option<&str>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            uid: Some(format!("uid-{name}")),
            annotations: (!annotations.is_empty()).then(|| {
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            }),
            ..Default::default()
        },
        spec: None,
        status: ip.map(|ip| PodStatus {
            pod_ips: Some(vec![PodIP { ip: ip.into() }]),
            ..Default::default()
        }),
    }
}

pub fn instance(name: &str, subnetwork: &str, aliases: &[(&str, &str)]) -> Instance {
    Instance {
        name: name.into(),
        network_interfaces: vec![NetworkInterface {
            name: "nic0".into(),
            network: "projects/p/global/networks/default".into(),
            subnetwork: format!("projects/p/regions/us-central1/subnetworks/{subnetwork}"),
            fingerprint: Some(format!("fp-{name}")),
            alias_ip_ranges: aliases
                .iter()
                .map(|(cidr, range)| AliasIpRange {
                    ip_cidr_range: cidr.to_string(),
                    subnetwork_range_name: Some(range.to_string()),
                })
                .collect(),
        }],
    }
}

pub fn subnetwork(name: &str, cidr: &str) -> Subnetwork {
    Subnetwork {
        name: name.into(),
        ip_cidr_range: cidr.into(),
        fingerprint: Some("fp-subnet".into()),
        secondary_ip_ranges: vec![],
    }
}

pub fn identity(instance: &str) -> InstanceIdentity {
    InstanceIdentity {
        project: "p".into(),
        zone: "us-central1-a".into(),
        region: "us-central1".into(),
        instance: instance.into(),
    }
}

pub fn pool(name: &str, cidr: &str) -> IPPool {
    IPPool::new(
        name,
        IPPoolSpec {
            cidr: cidr.into(),
            subnet: "projects/p/regions/us-central1/subnetworks/subnet-a".into(),
            secondary_range_name: Some("live".into()),
            allocations: BTreeMap::new(),
        },
    )
}

/// Context as the preamble would have assembled it against the mock state.
pub fn event_context(
    compute: &MockCompute,
    pod: Pod,
    node: &str,
    subnet_name: &str,
    pool_name: &str,
) -> EventContext {
    EventContext {
        pod,
        identity: identity(node),
        instance: compute.instance(node).expect("instance seeded"),
        subnet: compute.subnetwork(subnet_name).expect("subnetwork seeded"),
        pool_name: pool_name.into(),
    }
}

pub fn alias_cidrs(compute: &MockCompute, instance: &str) -> Vec<String> {
    compute
        .instance(instance)
        .expect("instance seeded")
        .network_interfaces[0]
        .alias_ip_ranges
        .iter()
        .map(|range| range.ip_cidr_range.clone())
        .collect()
}
