//! The compute surface the IPAM stack depends on, as a trait so the CNI
//! driver and the provisioner can be exercised against an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{GlobalOperation, Instance, InternalRange, NetworkInterface, Operation, Subnetwork};
use crate::Result;

/// Cadence of long-running-operation polls.
pub const OPERATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_instance(&self, project: &str, zone: &str, instance: &str) -> Result<Instance>;

    async fn get_subnetwork(
        &self,
        project: &str,
        region: &str,
        subnetwork: &str,
    ) -> Result<Subnetwork>;

    /// Patch a subnetwork; the patch must carry the subnetwork fingerprint
    /// observed at read. Returns a region operation.
    async fn patch_subnetwork(
        &self,
        project: &str,
        region: &str,
        subnetwork: &str,
        patch: &Subnetwork,
    ) -> Result<Operation>;

    /// Replace an instance's network interface; the update must carry the
    /// interface fingerprint observed at read. Returns a zone operation.
    async fn update_network_interface(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        interface: &str,
        update: &NetworkInterface,
    ) -> Result<Operation>;

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation>;

    async fn get_region_operation(
        &self,
        project: &str,
        region: &str,
        operation: &str,
    ) -> Result<Operation>;

    async fn get_internal_range(&self, project: &str, name: &str) -> Result<InternalRange>;

    async fn create_internal_range(
        &self,
        project: &str,
        name: &str,
        range: &InternalRange,
    ) -> Result<GlobalOperation>;

    /// `name` is the full operation path returned by create calls.
    async fn get_global_operation(&self, name: &str) -> Result<GlobalOperation>;
}

/// Poll a zone operation until terminal. Returns the joined error messages
/// as an error if the operation finished unsuccessfully.
pub async fn wait_zone_operation<C>(
    compute: &C,
    project: &str,
    zone: &str,
    operation: &str,
) -> Result<()>
where
    C: ComputeApi + ?Sized,
{
    loop {
        let op = compute.get_zone_operation(project, zone, operation).await?;
        if op.is_done() {
            return match op.error_message() {
                Some(message) => Err(Error::Operation(message)),
                None => Ok(()),
            };
        }
        tokio::time::sleep(OPERATION_POLL_INTERVAL).await;
    }
}

pub async fn wait_region_operation<C>(
    compute: &C,
    project: &str,
    region: &str,
    operation: &str,
) -> Result<()>
where
    C: ComputeApi + ?Sized,
{
    loop {
        let op = compute
            .get_region_operation(project, region, operation)
            .await?;
        if op.is_done() {
            return match op.error_message() {
                Some(message) => Err(Error::Operation(message)),
                None => Ok(()),
            };
        }
        tokio::time::sleep(OPERATION_POLL_INTERVAL).await;
    }
}

pub async fn wait_global_operation<C>(compute: &C, name: &str) -> Result<()>
where
    C: ComputeApi + ?Sized,
{
    loop {
        let op = compute.get_global_operation(name).await?;
        if op.done {
            return match op.error {
                Some(status) if !status.message.is_empty() => {
                    Err(Error::Operation(status.message))
                }
                Some(status) => Err(Error::Operation(format!("status code {}", status.code))),
                None => Ok(()),
            };
        }
        tokio::time::sleep(OPERATION_POLL_INTERVAL).await;
    }
}
