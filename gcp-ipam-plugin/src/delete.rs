use std::time::Instant;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use semver::Version;
use tracing::{debug, error, info, warn};

use gcp_ipam_allocator::{Allocator, KubePoolStore, PoolStore};
use gcp_ipam_gce::{ComputeApi, GceClient, MetadataClient, NetworkInterface, wait_zone_operation};

use crate::config::Args;
use crate::context::{self, ANNOTATION_MOVE_OUT_IP, EventContext};
use crate::response::Response;
use crate::types::Input;
use crate::{Error, LOCK_PATH, Result, lock::HostLock};

pub fn delete(args: &Args, input: Input) -> Response {
    // Nothing was set up for a sandbox that never had a namespace.
    if args.net_ns.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
        return Response::Empty(input.cni_version);
    }

    let started = Instant::now();
    let cni_version = input.cni_version.clone();

    let _lock = match HostLock::acquire(LOCK_PATH) {
        Ok(lock) => lock,
        Err(e) => return e.into_response(cni_version),
    };
    debug!("delete: acquired file lock after {:?}", started.elapsed());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => return Error::from(e).into_response(cni_version),
    };
    match runtime.block_on(run_delete(args, &input)) {
        Ok(()) => {
            info!("delete completed in {:?}", started.elapsed());
            Response::Empty(input.cni_version)
        }
        Err(e) => {
            error!(%e, "delete failed");
            e.into_response(cni_version)
        }
    }
}

async fn run_delete(args: &Args, input: &Input) -> Result<()> {
    let (namespace, name) = args.pod_identity()?;

    let client = context::kube_client().await?;
    let pod = context::fetch_pod(client.clone(), namespace, name).await?;
    debug!("delete: fetched pod {namespace}/{name}");

    let metadata = MetadataClient::new();
    let identity = metadata.identity().await?;
    let token = metadata.access_token().await?;
    let compute = GceClient::new(token);

    let ctx =
        context::load_context(&compute, identity, pod, input.ip_pool_name.as_deref()).await?;
    let allocator = Allocator::new(KubePoolStore::new(client));
    detach(&compute, &allocator, &ctx).await
}

/// The DEL state machine after the preamble: always remove the alias from
/// this instance, then release the pool entry unless the IP is mid-move.
/// Release failures are logged and swallowed: the instance-level state is
/// already correct, and the pool is repaired out of band.
async fn detach<C, S>(compute: &C, allocator: &Allocator<S>, ctx: &EventContext) -> Result<()>
where
    C: ComputeApi + ?Sized,
    S: PoolStore,
{
    let ip = pod_ip(&ctx.pod)?;
    let moving_out = context::annotation(&ctx.pod, ANNOTATION_MOVE_OUT_IP).is_some();
    if moving_out {
        info!("move-out annotation present, keeping pool allocation for {ip}");
    }

    let interface = context::primary_interface(&ctx.instance)?;
    let update = NetworkInterface {
        fingerprint: interface.fingerprint.clone(),
        alias_ip_ranges: context::without_alias(&interface.alias_ip_ranges, &ip),
        ..Default::default()
    };
    let operation = compute
        .update_network_interface(
            &ctx.identity.project,
            &ctx.identity.zone,
            &ctx.identity.instance,
            &interface.name,
            &update,
        )
        .await?;
    wait_zone_operation(
        compute,
        &ctx.identity.project,
        &ctx.identity.zone,
        &operation.name,
    )
    .await?;
    info!("removed {ip}/32 from instance {}", ctx.identity.instance);

    if !moving_out {
        if let Err(e) = allocator.release(&ctx.pool_name, &ip).await {
            warn!(%e, "failed to release IP {ip} from pool {}", ctx.pool_name);
        } else {
            info!("released IP {ip} from pool {}", ctx.pool_name);
        }
    }
    Ok(())
}

fn pod_ip(pod: &Pod) -> Result<String> {
    pod.status
        .as_ref()
        .and_then(|status| status.pod_ips.as_ref())
        .and_then(|ips| ips.first())
        .map(|pod_ip| pod_ip.ip.clone())
        .ok_or_else(|| Error::MissingPodIp {
            namespace: pod.namespace().unwrap_or_default(),
            name: pod.name_any(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use gcp_ipam_allocator::MemoryPoolStore;
    use gcp_ipam_crds::v1alpha1::ippool::IpAllocation;
    use gcp_ipam_gce::MockCompute;

    use super::*;
    use crate::config::Command;
    use crate::testutil::{alias_cidrs, event_context, instance, pod, pool, subnetwork};

    fn seeded_store(ip: &str) -> MemoryPoolStore {
        let store = MemoryPoolStore::new();
        let mut seeded = pool("ippool-subnet-a", "10.111.0.0/16");
        seeded.spec.allocations.insert(
            ip.into(),
            IpAllocation {
                pod_name: "p1".into(),
                pod_namespace: "ns".into(),
                pod_uid: "uid-a".into(),
                node_name: "node-a".into(),
                allocated_at: None,
            },
        );
        store.put(seeded);
        store
    }

    #[tokio::test]
    async fn standard_delete_detaches_and_releases() {
        let compute = MockCompute::new();
        compute.put_instance(instance(
            "node-a",
            "subnet-a",
            &[("10.111.0.5/32", "live")],
        ));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        let store = seeded_store("10.111.0.5");
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod("ns", "p1", &[], Some("10.111.0.5")),
            "node-a",
            "subnet-a",
            "ippool-subnet-a",
        );
        detach(&compute, &allocator, &ctx).await.unwrap();

        assert!(alias_cidrs(&compute, "node-a").is_empty());
        let stored = store.pool("ippool-subnet-a").unwrap();
        assert!(stored.spec.allocations.is_empty());
        let status = stored.status.as_ref().unwrap();
        assert_eq!((status.allocated, status.available), (0, status.capacity));
    }

    #[tokio::test]
    async fn move_out_delete_keeps_the_pool_allocation() {
        let compute = MockCompute::new();
        compute.put_instance(instance(
            "node-a",
            "subnet-a",
            &[("10.111.0.5/32", "live")],
        ));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        let store = seeded_store("10.111.0.5");
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod(
                "ns",
                "p1",
                &[(ANNOTATION_MOVE_OUT_IP, "true")],
                Some("10.111.0.5"),
            ),
            "node-a",
            "subnet-a",
            "ippool-subnet-a",
        );
        detach(&compute, &allocator, &ctx).await.unwrap();

        assert!(alias_cidrs(&compute, "node-a").is_empty());
        let stored = store.pool("ippool-subnet-a").unwrap();
        assert_eq!(stored.spec.allocations.len(), 1);
        assert_eq!(stored.spec.allocations["10.111.0.5"].node_name, "node-a");
    }

    #[tokio::test]
    async fn release_failure_does_not_fail_the_delete() {
        let compute = MockCompute::new();
        compute.put_instance(instance(
            "node-a",
            "subnet-a",
            &[("10.111.0.5/32", "live")],
        ));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        // No pool in the store: release will fail, delete must not.
        let store = MemoryPoolStore::new();
        let allocator = Allocator::new(store);

        let ctx = event_context(
            &compute,
            pod("ns", "p1", &[], Some("10.111.0.5")),
            "node-a",
            "subnet-a",
            "ippool-subnet-a",
        );
        detach(&compute, &allocator, &ctx).await.unwrap();
        assert!(alias_cidrs(&compute, "node-a").is_empty());
    }

    #[tokio::test]
    async fn failed_alias_removal_fails_the_delete_and_skips_release() {
        let compute = MockCompute::new();
        compute.put_instance(instance(
            "node-a",
            "subnet-a",
            &[("10.111.0.5/32", "live")],
        ));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        compute.fail_next_interface_update("fingerprint mismatch");
        let store = seeded_store("10.111.0.5");
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod("ns", "p1", &[], Some("10.111.0.5")),
            "node-a",
            "subnet-a",
            "ippool-subnet-a",
        );
        let err = detach(&compute, &allocator, &ctx).await.unwrap_err();
        assert!(matches!(err, Error::Gce(_)));
        assert_eq!(
            store
                .pool("ippool-subnet-a")
                .unwrap()
                .spec
                .allocations
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn pod_without_status_ip_is_an_error() {
        let missing = pod("ns", "p1", &[], None);
        assert!(matches!(pod_ip(&missing), Err(Error::MissingPodIp { .. })));
    }

    #[test]
    fn empty_netns_returns_success_immediately() {
        let args = Args {
            command: Command::Delete,
            container_id: "abc".into(),
            net_ns: None,
            ifname: "eth0".into(),
            args: BTreeMap::new(),
            paths: String::new(),
        };
        let input: Input = serde_json::from_str(
            r#"{"cniVersion": "1.0.0", "name": "net", "type": "gcp-ipam"}"#,
        )
        .unwrap();
        assert!(matches!(delete(&args, input), Response::Empty(_)));
    }
}
