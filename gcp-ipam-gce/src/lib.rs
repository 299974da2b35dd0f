//! Typed client for the slice of the GCE surface the IPAM stack touches:
//! the instance metadata server, instances and subnetworks with their
//! long-running operations, and Network Connectivity internal ranges.

pub mod client;
pub mod compute;
pub mod error;
pub mod metadata;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod models;

pub use client::GceClient;
pub use compute::{
    ComputeApi, wait_global_operation, wait_region_operation, wait_zone_operation,
};
pub use error::Error;
pub use metadata::{InstanceIdentity, MetadataClient, region_from_zone};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{InterfaceUpdate, MockCompute};
pub use models::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;
