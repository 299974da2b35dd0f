use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use ipnetwork::Ipv4Network;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tracing::debug;

use gcp_ipam_crds::v1alpha1::ippool::{IPPool, IPPoolStatus, IpAllocation};

use crate::error::Error;
use crate::scan;
use crate::store::{PoolStore, StoreError};
use crate::Result;

/// Maximum number of attempts for a pool write that keeps losing the race.
pub const MAX_RETRIES: usize = 10;

/// Base delay between attempts; doubles after every conflict.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct AllocationRequest {
    pub pool_name: String,
    pub pod_name: String,
    pub pod_namespace: String,
    pub pod_uid: String,
    pub node_name: String,
    /// Exact IP to allocate. Fails if taken; no scan happens.
    pub requested_ip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationResult {
    pub ip: String,
    pub cidr: String,
    pub subnet: String,
    pub secondary_range_name: Option<String>,
}

pub struct Allocator<S> {
    store: S,
}

impl<S: PoolStore> Allocator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Allocate an IP from the pool, retrying lost CAS races.
    pub async fn allocate(&self, request: &AllocationRequest) -> Result<AllocationResult> {
        self.with_conflict_retry(|| self.try_allocate(request)).await
    }

    /// Read the allocation backing `ip`. Never mutates the pool.
    pub async fn get_allocation(&self, pool_name: &str, ip: &str) -> Result<AllocationResult> {
        let pool = self.get_pool(pool_name).await?;
        if !pool.spec.allocations.contains_key(ip) {
            return Err(Error::NotAllocated {
                pool: pool_name.to_string(),
                ip: ip.to_string(),
            });
        }
        Ok(result_for(&pool, ip))
    }

    /// Return `ip` to the pool. Removing an absent key is a no-op that still
    /// refreshes the status counters.
    pub async fn release(&self, pool_name: &str, ip: &str) -> Result<()> {
        self.with_conflict_retry(|| self.try_release(pool_name, ip))
            .await
    }

    async fn try_allocate(&self, request: &AllocationRequest) -> Result<AllocationResult> {
        let mut pool = self.get_pool(&request.pool_name).await?;
        let cidr = parse_cidr(&pool.spec.cidr)?;

        let ip = match &request.requested_ip {
            Some(requested) => {
                if pool.spec.allocations.contains_key(requested) {
                    return Err(Error::AlreadyAllocated(requested.clone()));
                }
                requested.clone()
            }
            None => scan::find_available_ip(&cidr, &pool.spec.allocations)
                .ok_or_else(|| Error::Exhausted(pool.spec.cidr.clone()))?
                .to_string(),
        };

        pool.spec.allocations.insert(
            ip.clone(),
            IpAllocation {
                pod_name: request.pod_name.clone(),
                pod_namespace: request.pod_namespace.clone(),
                pod_uid: request.pod_uid.clone(),
                node_name: request.node_name.clone(),
                allocated_at: Some(Time(Utc::now())),
            },
        );
        refresh_status(&mut pool, &cidr);

        let pool = self.store.update(&pool).await?;
        debug!(ip = %ip, pool = %request.pool_name, "allocated");
        Ok(result_for(&pool, &ip))
    }

    async fn try_release(&self, pool_name: &str, ip: &str) -> Result<()> {
        let mut pool = self.get_pool(pool_name).await?;
        pool.spec.allocations.remove(ip);
        let cidr = parse_cidr(&pool.spec.cidr)?;
        refresh_status(&mut pool, &cidr);
        self.store.update(&pool).await?;
        debug!(ip = %ip, pool = %pool_name, "released");
        Ok(())
    }

    async fn get_pool(&self, name: &str) -> Result<IPPool> {
        self.store.get(name).await.map_err(|e| match e {
            StoreError::NotFound(name) => Error::PoolNotFound(name),
            other => Error::Store(other),
        })
    }

    /// Shared bounded retry loop. Only conflicts retry; everything else
    /// surfaces as-is.
    async fn with_conflict_retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last = StoreError::Conflict("pool update conflict".into());
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY * (1 << (attempt - 1))).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(Error::Store(err)) if err.is_conflict() => {
                    debug!(attempt, %err, "pool update conflict, retrying");
                    last = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::ConflictExhausted {
            attempts: MAX_RETRIES,
            last,
        })
    }
}

fn result_for(pool: &IPPool, ip: &str) -> AllocationResult {
    AllocationResult {
        ip: ip.to_string(),
        cidr: pool.spec.cidr.clone(),
        subnet: pool.spec.subnet.clone(),
        secondary_range_name: pool.spec.secondary_range_name.clone(),
    }
}

fn parse_cidr(cidr: &str) -> Result<Ipv4Network> {
    cidr.parse().map_err(|e: ipnetwork::IpNetworkError| Error::InvalidCidr {
        cidr: cidr.to_string(),
        reason: e.to_string(),
    })
}

fn refresh_status(pool: &mut IPPool, cidr: &Ipv4Network) {
    let capacity = scan::capacity(cidr);
    let allocated = pool.spec.allocations.len() as i64;
    pool.status = Some(IPPoolStatus {
        capacity,
        allocated,
        available: capacity - allocated,
        last_updated: Some(Time(Utc::now())),
    });
}
