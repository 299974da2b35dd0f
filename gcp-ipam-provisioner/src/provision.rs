use std::collections::BTreeMap;

use tracing::info;

use gcp_ipam_allocator::{PoolStore, StoreError};
use gcp_ipam_crds::v1alpha1::ippool::{IPPool, IPPoolSpec, pool_name_for_subnetwork};
use gcp_ipam_gce::{
    ComputeApi, Subnetwork, SubnetworkSecondaryRange, wait_region_operation,
};

use crate::Result;
use crate::cluster::ClusterInfo;
use crate::range;

pub struct Config {
    pub secondary_range_name: String,
    pub range_size_bits: i32,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secondary_range_name: "live".into(),
            range_size_bits: 16,
            dry_run: false,
        }
    }
}

pub struct Provisioner<C, S> {
    compute: C,
    store: S,
    config: Config,
}

impl<C, S> Provisioner<C, S>
where
    C: ComputeApi,
    S: PoolStore,
{
    pub fn new(compute: C, store: S, config: Config) -> Self {
        Self {
            compute,
            store,
            config,
        }
    }

    /// Establish the secondary range and the pool record for this cluster's
    /// subnetwork. Every step is a fetch-or-create, so re-running after a
    /// partial failure picks up where the last run stopped.
    pub async fn provision(&self, info: &ClusterInfo) -> Result<()> {
        let subnet = self
            .compute
            .get_subnetwork(&info.project, &info.region, &info.subnetwork_name)
            .await?;
        info!(
            primary_cidr = %subnet.ip_cidr_range,
            secondary_ranges = subnet.secondary_ip_ranges.len(),
            "current subnet configuration"
        );

        let subnet_url = format!(
            "projects/{}/regions/{}/subnetworks/{}",
            info.project, info.region, info.subnetwork_name
        );

        if let Some(existing) = subnet
            .secondary_ip_ranges
            .iter()
            .find(|range| range.range_name == self.config.secondary_range_name)
        {
            info!(
                name = %existing.range_name,
                cidr = %existing.ip_cidr_range,
                "secondary range already exists"
            );
            return self
                .ensure_ip_pool(info, &existing.ip_cidr_range, &subnet_url)
                .await;
        }

        if self.config.dry_run {
            info!(
                name = %self.config.secondary_range_name,
                prefix_length = self.config.range_size_bits,
                subnetwork = %info.subnetwork_name,
                "dry run: would reserve an internal range and attach it as a secondary range"
            );
            return Ok(());
        }

        let cidr = range::ensure_internal_range(
            &self.compute,
            info,
            &self.config.secondary_range_name,
            self.config.range_size_bits,
        )
        .await?;

        info!(
            name = %self.config.secondary_range_name,
            %cidr,
            "attaching secondary range to subnet"
        );
        let mut secondary_ranges = subnet.secondary_ip_ranges.clone();
        secondary_ranges.push(SubnetworkSecondaryRange {
            range_name: self.config.secondary_range_name.clone(),
            ip_cidr_range: cidr.clone(),
            reserved_internal_range: Some(format!(
                "//networkconnectivity.googleapis.com/projects/{}/locations/global/internalRanges/{}",
                info.project, self.config.secondary_range_name
            )),
        });
        let patch = Subnetwork {
            fingerprint: subnet.fingerprint.clone(),
            secondary_ip_ranges: secondary_ranges,
            ..Default::default()
        };
        let operation = self
            .compute
            .patch_subnetwork(&info.project, &info.region, &info.subnetwork_name, &patch)
            .await?;
        wait_region_operation(&self.compute, &info.project, &info.region, &operation.name)
            .await?;
        info!("subnet update completed");

        self.ensure_ip_pool(info, &cidr, &subnet_url).await
    }

    /// Create the pool record, or refresh its spec while preserving the
    /// allocation map and version token of an existing one.
    async fn ensure_ip_pool(&self, info: &ClusterInfo, cidr: &str, subnet_url: &str) -> Result<()> {
        let pool_name = pool_name_for_subnetwork(&info.subnetwork_name);
        let mut pool = IPPool::new(
            &pool_name,
            IPPoolSpec {
                cidr: cidr.to_string(),
                subnet: subnet_url.to_string(),
                secondary_range_name: Some(self.config.secondary_range_name.clone()),
                allocations: BTreeMap::new(),
            },
        );

        match self.store.get(&pool_name).await {
            Ok(existing) => {
                if self.config.dry_run {
                    info!(%pool_name, "dry run: would update IPPool");
                    return Ok(());
                }
                pool.spec.allocations = existing.spec.allocations;
                pool.metadata.resource_version = existing.metadata.resource_version;
                self.store.update(&pool).await?;
                info!(%pool_name, %cidr, "IPPool updated");
            }
            Err(StoreError::NotFound(_)) => {
                if self.config.dry_run {
                    info!(%pool_name, "dry run: would create IPPool");
                    return Ok(());
                }
                self.store.create(&pool).await?;
                info!(%pool_name, %cidr, "IPPool created");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
