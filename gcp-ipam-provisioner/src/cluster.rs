use anyhow::Context;
use tracing::debug;

use gcp_ipam_gce::{ComputeApi, InstanceIdentity, resource_short_name};

use crate::Result;

/// Where this cluster lives, derived from the local VM's primary interface.
/// Assumes a single subnet for the cluster.
pub struct ClusterInfo {
    pub project: String,
    pub zone: String,
    pub region: String,
    pub network_name: String,
    pub subnetwork_name: String,
}

pub async fn discover<C>(compute: &C, identity: InstanceIdentity) -> Result<ClusterInfo>
where
    C: ComputeApi + ?Sized,
{
    let instance = compute
        .get_instance(&identity.project, &identity.zone, &identity.instance)
        .await
        .context("get instance details")?;

    let interface = instance
        .network_interfaces
        .first()
        .context("instance has no network interfaces")?;
    debug!(network = %interface.network, subnetwork = %interface.subnetwork, "primary interface");

    Ok(ClusterInfo {
        project: identity.project,
        zone: identity.zone,
        region: identity.region,
        network_name: resource_short_name(&interface.network).to_string(),
        subnetwork_name: resource_short_name(&interface.subnetwork).to_string(),
    })
}
