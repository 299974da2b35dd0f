use std::net::{AddrParseError, IpAddr, Ipv4Addr};
use std::time::Instant;

use ipnetwork::{IpNetwork, Ipv4Network};
use kube::ResourceExt;
use semver::Version;
use tracing::{debug, error, info};

use gcp_ipam_allocator::{AllocationRequest, AllocationResult, Allocator, KubePoolStore, PoolStore};
use gcp_ipam_crds::v1alpha1::ippool::DEFAULT_SECONDARY_RANGE_NAME;
use gcp_ipam_gce::{
    AliasIpRange, ComputeApi, GceClient, InstanceIdentity, MetadataClient, NetworkInterface,
    wait_zone_operation,
};

use crate::config::Args;
use crate::context::{self, ANNOTATION_LIVE_IP, ANNOTATION_ORIGINAL_INSTANCE, EventContext};
use crate::response::{Response, Success};
use crate::types::{Input, Ip, Route};
use crate::{Error, LOCK_PATH, Result, lock::HostLock};

pub fn add(args: &Args, input: Input) -> Response {
    let started = Instant::now();
    let cni_version = input.cni_version.clone();

    let _lock = match HostLock::acquire(LOCK_PATH) {
        Ok(lock) => lock,
        Err(e) => return e.into_response(cni_version),
    };
    debug!("add: acquired file lock after {:?}", started.elapsed());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => return Error::from(e).into_response(cni_version),
    };
    match runtime.block_on(run_add(args, &input)) {
        Ok(success) => {
            info!("add completed in {:?}", started.elapsed());
            Response::Success(success)
        }
        Err(e) => {
            error!(%e, "add failed");
            e.into_response(cni_version)
        }
    }
}

async fn run_add(args: &Args, input: &Input) -> Result<Success> {
    let (namespace, name) = args.pod_identity()?;

    let client = context::kube_client().await?;
    let pod = context::fetch_pod(client.clone(), namespace, name).await?;
    debug!("add: fetched pod {namespace}/{name}");

    let metadata = MetadataClient::new();
    let identity = metadata.identity().await?;
    let token = metadata.access_token().await?;
    let compute = GceClient::new(token);

    let ctx =
        context::load_context(&compute, identity, pod, input.ip_pool_name.as_deref()).await?;
    let allocator = Allocator::new(KubePoolStore::new(client));
    attach(&compute, &allocator, &ctx, input.cni_version.clone()).await
}

/// The ADD state machine after the preamble: allocate (or look up, for
/// migrations), detach from the source when one is named, attach here, and
/// build the result. Allocation strictly precedes any cloud mutation; the
/// source detach completes before the destination attach begins.
async fn attach<C, S>(
    compute: &C,
    allocator: &Allocator<S>,
    ctx: &EventContext,
    cni_version: Version,
) -> Result<Success>
where
    C: ComputeApi + ?Sized,
    S: PoolStore,
{
    let requested_ip = context::annotation(&ctx.pod, ANNOTATION_LIVE_IP);
    let original_instance = context::annotation(&ctx.pod, ANNOTATION_ORIGINAL_INSTANCE);

    let allocation = match requested_ip {
        None => {
            let request = AllocationRequest {
                pool_name: ctx.pool_name.clone(),
                pod_name: ctx.pod.name_any(),
                pod_namespace: ctx.pod.namespace().unwrap_or_default(),
                pod_uid: ctx.pod.metadata.uid.clone().unwrap_or_default(),
                node_name: ctx.identity.instance.clone(),
                requested_ip: None,
            };
            let allocation = allocator.allocate(&request).await?;
            info!("allocated IP {} from pool {}", allocation.ip, ctx.pool_name);
            allocation
        }
        Some(ip) => {
            // Migration: the pool entry already exists, written on the
            // source node. Look it up instead of allocating.
            info!("migration flow, reusing IP {ip}");
            allocator.get_allocation(&ctx.pool_name, ip).await?
        }
    };
    let new_ip = allocation.ip.clone();

    if let (Some(ip), Some(source)) = (requested_ip, original_instance) {
        detach_from_source(compute, &ctx.identity, source, ip).await?;
    }

    let range_name = allocation
        .secondary_range_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SECONDARY_RANGE_NAME.to_string());

    let interface = context::primary_interface(&ctx.instance)?;
    let mut alias_ranges = interface.alias_ip_ranges.clone();
    alias_ranges.push(AliasIpRange {
        ip_cidr_range: format!("{new_ip}/32"),
        subnetwork_range_name: Some(range_name),
    });
    let update = NetworkInterface {
        fingerprint: interface.fingerprint.clone(),
        alias_ip_ranges: alias_ranges,
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
    info!(
        "attached {new_ip}/32 to instance {}",
        ctx.identity.instance
    );

    build_result(ctx, &allocation, &new_ip, cni_version)
}

/// Remove `<ip>/32` from the source instance's primary interface and wait
/// for the update to finish, so the address is never attached twice.
async fn detach_from_source<C>(
    compute: &C,
    identity: &InstanceIdentity,
    source: &str,
    ip: &str,
) -> Result<()>
where
    C: ComputeApi + ?Sized,
{
    info!("migrating IP {ip} off instance {source}");
    let instance = compute
        .get_instance(&identity.project, &identity.zone, source)
        .await?;
    let interface = context::primary_interface(&instance)?;
    let update = NetworkInterface {
        fingerprint: interface.fingerprint.clone(),
        alias_ip_ranges: context::without_alias(&interface.alias_ip_ranges, ip),
        ..Default::default()
    };
    let operation = compute
        .update_network_interface(&identity.project, &identity.zone, source, &interface.name, &update)
        .await?;
    wait_zone_operation(compute, &identity.project, &identity.zone, &operation.name).await?;
    Ok(())
}

fn build_result(
    ctx: &EventContext,
    allocation: &AllocationResult,
    ip: &str,
    cni_version: Version,
) -> Result<Success> {
    let subnet_cidr: Ipv4Network = ctx.subnet.ip_cidr_range.parse().map_err(|e| {
        Error::InvalidNetworkConfig(format!(
            "subnetwork CIDR {}: {e}",
            ctx.subnet.ip_cidr_range
        ))
    })?;
    let pool_cidr: Ipv4Network = allocation.cidr.parse().map_err(|e| {
        Error::InvalidNetworkConfig(format!("pool CIDR {}: {e}", allocation.cidr))
    })?;
    let address: Ipv4Addr = ip
        .parse()
        .map_err(|e: AddrParseError| Error::Parse(format!("allocated IP {ip}: {e}")))?;

    let address = Ipv4Network::new(address, subnet_cidr.prefix())
        .map_err(|e| Error::Parse(e.to_string()))?;
    let default_route = Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0)
        .map_err(|e| Error::Parse(e.to_string()))?;

    Ok(Success {
        cni_version,
        interfaces: vec![],
        ips: vec![Ip {
            address: IpNetwork::V4(address),
            gateway: IpAddr::V4(gateway_for(&pool_cidr)),
            interface: None,
        }],
        routes: vec![Route {
            dst: IpNetwork::V4(default_route),
            gw: None,
        }],
        dns: None,
    })
}

/// Pods route via the first host of the pool's network: the network address
/// with its final octet bumped by one.
fn gateway_for(pool_cidr: &Ipv4Network) -> Ipv4Addr {
    let mut octets = pool_cidr.network().octets();
    octets[3] = octets[3].wrapping_add(1);
    Ipv4Addr::from(octets)
}

#[cfg(test)]
mod tests {
    use gcp_ipam_allocator::MemoryPoolStore;
    use gcp_ipam_gce::MockCompute;

    use super::*;
    use crate::context::{ANNOTATION_LIVE_IP, ANNOTATION_ORIGINAL_INSTANCE};
    use crate::testutil::{alias_cidrs, event_context, instance, pod, pool, subnetwork};

    fn version() -> Version {
        Version::new(1, 0, 0)
    }

    #[tokio::test]
    async fn standard_add_allocates_and_attaches() {
        let compute = MockCompute::new();
        compute.put_instance(instance("node-a", "subnet-a", &[]));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        let store = MemoryPoolStore::new();
        store.put(pool("ippool-subnet-a", "10.111.0.0/16"));
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod("ns", "p1", &[], None),
            "node-a",
            "subnet-a",
            "ippool-subnet-a",
        );
        let success = attach(&compute, &allocator, &ctx, version()).await.unwrap();

        assert_eq!(success.ips.len(), 1);
        assert_eq!(success.ips[0].address.to_string(), "10.111.0.1/16");
        assert_eq!(success.ips[0].gateway.to_string(), "10.111.0.1");
        assert_eq!(success.routes.len(), 1);
        assert_eq!(success.routes[0].dst.to_string(), "0.0.0.0/0");

        let stored = store.pool("ippool-subnet-a").unwrap();
        let allocation = &stored.spec.allocations["10.111.0.1"];
        assert_eq!(allocation.pod_namespace, "ns");
        assert_eq!(allocation.pod_name, "p1");
        assert_eq!(allocation.node_name, "node-a");

        assert_eq!(alias_cidrs(&compute, "node-a"), vec!["10.111.0.1/32"]);
        let updates = compute.interface_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].update.alias_ip_ranges[0].subnetwork_range_name.as_deref(),
            Some("live")
        );
    }

    #[tokio::test]
    async fn sequential_adds_hand_out_ascending_addresses() {
        let compute = MockCompute::new();
        compute.put_instance(instance("node-a", "subnet-a", &[]));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        let store = MemoryPoolStore::new();
        store.put(pool("ippool-subnet-a", "10.111.0.0/16"));
        let allocator = Allocator::new(store.clone());

        let mut addresses = Vec::new();
        for name in ["p1", "p2", "p3"] {
            let ctx = event_context(
                &compute,
                pod("ns", name, &[], None),
                "node-a",
                "subnet-a",
                "ippool-subnet-a",
            );
            let success = attach(&compute, &allocator, &ctx, version()).await.unwrap();
            addresses.push(success.ips[0].address.ip().to_string());
        }
        assert_eq!(addresses, ["10.111.0.1", "10.111.0.2", "10.111.0.3"]);
    }

    #[tokio::test]
    async fn migration_add_moves_the_alias_without_touching_the_pool() {
        let compute = MockCompute::new();
        compute.put_instance(instance(
            "node-a",
            "subnet-a",
            &[("10.111.0.5/32", "live")],
        ));
        compute.put_instance(instance("node-b", "subnet-a", &[]));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));

        let store = MemoryPoolStore::new();
        let mut seeded = pool("ippool-subnet-a", "10.111.0.0/16");
        seeded.spec.allocations.insert(
            "10.111.0.5".into(),
            gcp_ipam_crds::v1alpha1::ippool::IpAllocation {
                pod_name: "p1".into(),
                pod_namespace: "ns".into(),
                pod_uid: "uid-a".into(),
                node_name: "node-a".into(),
                allocated_at: None,
            },
        );
        store.put(seeded);
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod(
                "ns",
                "p2",
                &[
                    (ANNOTATION_LIVE_IP, "10.111.0.5"),
                    (ANNOTATION_ORIGINAL_INSTANCE, "node-a"),
                ],
                None,
            ),
            "node-b",
            "subnet-a",
            "ippool-subnet-a",
        );
        let success = attach(&compute, &allocator, &ctx, version()).await.unwrap();

        assert_eq!(success.ips[0].address.to_string(), "10.111.0.5/16");

        // Source lost the alias, destination gained it, in that order.
        assert!(alias_cidrs(&compute, "node-a").is_empty());
        assert_eq!(alias_cidrs(&compute, "node-b"), vec!["10.111.0.5/32"]);
        let updates = compute.interface_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].instance, "node-a");
        assert_eq!(updates[1].instance, "node-b");

        // Pool record untouched: still one allocation, still naming node-a.
        let stored = store.pool("ippool-subnet-a").unwrap();
        assert_eq!(stored.spec.allocations.len(), 1);
        assert_eq!(stored.spec.allocations["10.111.0.5"].node_name, "node-a");
    }

    #[tokio::test]
    async fn migration_add_fails_when_allocation_is_missing() {
        let compute = MockCompute::new();
        compute.put_instance(instance("node-b", "subnet-a", &[]));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        let store = MemoryPoolStore::new();
        store.put(pool("ippool-subnet-a", "10.111.0.0/16"));
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod("ns", "p2", &[(ANNOTATION_LIVE_IP, "10.111.0.5")], None),
            "node-b",
            "subnet-a",
            "ippool-subnet-a",
        );
        let err = attach(&compute, &allocator, &ctx, version()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Allocator(gcp_ipam_allocator::Error::NotAllocated { .. })
        ));
        assert!(compute.interface_updates().is_empty());
    }

    #[tokio::test]
    async fn failed_source_detach_stops_before_destination_attach() {
        let compute = MockCompute::new();
        compute.put_instance(instance(
            "node-a",
            "subnet-a",
            &[("10.111.0.5/32", "live")],
        ));
        compute.put_instance(instance("node-b", "subnet-a", &[]));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        compute.fail_next_interface_update("fingerprint mismatch");

        let store = MemoryPoolStore::new();
        let mut seeded = pool("ippool-subnet-a", "10.111.0.0/16");
        seeded.spec.allocations.insert(
            "10.111.0.5".into(),
            gcp_ipam_crds::v1alpha1::ippool::IpAllocation {
                pod_name: "p1".into(),
                pod_namespace: "ns".into(),
                pod_uid: "uid-a".into(),
                node_name: "node-a".into(),
                allocated_at: None,
            },
        );
        store.put(seeded.clone());
        let allocator = Allocator::new(store.clone());

        let ctx = event_context(
            &compute,
            pod(
                "ns",
                "p2",
                &[
                    (ANNOTATION_LIVE_IP, "10.111.0.5"),
                    (ANNOTATION_ORIGINAL_INSTANCE, "node-a"),
                ],
                None,
            ),
            "node-b",
            "subnet-a",
            "ippool-subnet-a",
        );
        let err = attach(&compute, &allocator, &ctx, version()).await.unwrap_err();
        assert!(matches!(err, Error::Gce(_)));

        assert!(compute.interface_updates().is_empty());
        assert_eq!(alias_cidrs(&compute, "node-a"), vec!["10.111.0.5/32"]);
        assert!(alias_cidrs(&compute, "node-b").is_empty());
        assert_eq!(store.pool("ippool-subnet-a").unwrap().spec, seeded.spec);
    }

    #[tokio::test]
    async fn exhausted_pool_fails_without_touching_the_interface() {
        let compute = MockCompute::new();
        compute.put_instance(instance("node-a", "subnet-a", &[]));
        compute.put_subnetwork(subnetwork("subnet-a", "10.110.0.0/16"));
        let store = MemoryPoolStore::new();
        store.put(pool("small", "10.0.0.0/30"));
        let allocator = Allocator::new(store.clone());

        for name in ["p1", "p2"] {
            let ctx = event_context(
                &compute,
                pod("ns", name, &[], None),
                "node-a",
                "subnet-a",
                "small",
            );
            attach(&compute, &allocator, &ctx, version()).await.unwrap();
        }

        let ctx = event_context(&compute, pod("ns", "p3", &[], None), "node-a", "subnet-a", "small");
        let err = attach(&compute, &allocator, &ctx, version()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Allocator(gcp_ipam_allocator::Error::Exhausted(_))
        ));
        assert_eq!(compute.interface_updates().len(), 2);
    }

    #[test]
    fn gateway_is_pool_network_plus_one() {
        let cases = [
            ("10.111.0.0/16", "10.111.0.1"),
            ("192.168.4.0/22", "192.168.4.1"),
            ("10.0.0.0/30", "10.0.0.1"),
        ];
        for (cidr, gateway) in cases {
            assert_eq!(gateway_for(&cidr.parse().unwrap()).to_string(), gateway);
        }
    }
}
