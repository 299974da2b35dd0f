use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};

use gcp_ipam_crds::v1alpha1::ippool::pool_name_for_subnetwork;
use gcp_ipam_gce::{
    AliasIpRange, ComputeApi, Instance, InstanceIdentity, NetworkInterface, Subnetwork,
    resource_short_name,
};

use crate::{Error, Result};

/// Kubeconfig the kubelet leaves on every node.
pub const KUBECONFIG_PATH: &str = "/var/lib/kubelet/kubeconfig";

/// Exact IP to reuse on the destination node; presence marks a migration ADD.
pub const ANNOTATION_LIVE_IP: &str = "live.cast.ai/ip";

/// Source VM the IP is still attached to during a migration ADD.
pub const ANNOTATION_ORIGINAL_INSTANCE: &str = "live.cast.ai/original-instance";

/// Present on the source pod while its IP moves; suppresses the pool release.
pub const ANNOTATION_MOVE_OUT_IP: &str = "live.cast.ai/move-out-ip";

/// Everything ADD and DEL share before they diverge: the pod, the VM's
/// identity, and the network topology around its primary interface.
pub struct EventContext {
    pub pod: Pod,
    pub identity: InstanceIdentity,
    pub instance: Instance,
    pub subnet: Subnetwork,
    pub pool_name: String,
}

pub async fn kube_client() -> Result<kube::Client> {
    let kubeconfig = Kubeconfig::read_from(KUBECONFIG_PATH)?;
    let config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(kube::Client::try_from(config)?)
}

pub async fn fetch_pod(client: kube::Client, namespace: &str, name: &str) -> Result<Pod> {
    let pods: Api<Pod> = Api::namespaced(client, namespace);
    Ok(pods.get(name).await?)
}

/// Resolve the instance, its subnetwork and the pool name for this event.
pub async fn load_context<C>(
    compute: &C,
    identity: InstanceIdentity,
    pod: Pod,
    ip_pool_name: Option<&str>,
) -> Result<EventContext>
where
    C: ComputeApi + ?Sized,
{
    let instance = compute
        .get_instance(&identity.project, &identity.zone, &identity.instance)
        .await?;
    let interface = primary_interface(&instance)?;
    let subnetwork_name = resource_short_name(&interface.subnetwork).to_string();
    let subnet = compute
        .get_subnetwork(&identity.project, &identity.region, &subnetwork_name)
        .await?;

    let pool_name = match ip_pool_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => pool_name_for_subnetwork(&subnetwork_name),
    };

    Ok(EventContext {
        pod,
        identity,
        instance,
        subnet,
        pool_name,
    })
}

pub fn primary_interface(instance: &Instance) -> Result<&NetworkInterface> {
    instance
        .network_interfaces
        .first()
        .ok_or(Error::NoNetworkInterfaces)
}

pub fn annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}

/// Alias list with the `<ip>/32` entry removed, everything else untouched.
pub fn without_alias(ranges: &[AliasIpRange], ip: &str) -> Vec<AliasIpRange> {
    let cidr = format!("{ip}/32");
    ranges
        .iter()
        .filter(|range| range.ip_cidr_range != cidr)
        .cloned()
        .collect()
}
