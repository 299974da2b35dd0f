//! IP allocation over the cluster-wide `IPPool` record.
//!
//! The allocator never locks: it reads the pool, mutates its copy and writes
//! back with the version token it observed. A lost race surfaces as a
//! conflict and is retried with exponential backoff, bounded so failure is
//! deterministic under sustained contention.

pub mod allocator;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod scan;
pub mod store;

pub use allocator::{AllocationRequest, AllocationResult, Allocator, MAX_RETRIES, RETRY_DELAY};
pub use error::Error;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryPoolStore;
pub use store::{KubePoolStore, PoolStore, StoreError};

pub type Result<T, E = Error> = std::result::Result<T, E>;
