use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("pool {0} not found")]
    PoolNotFound(String),

    #[error("no available IPs in CIDR {0}")]
    Exhausted(String),

    #[error("requested IP {0} is already allocated")]
    AlreadyAllocated(String),

    #[error("IP {ip} not found in pool {pool}")]
    NotAllocated { pool: String, ip: String },

    #[error("gave up after {attempts} conflicting pool updates: {last}")]
    ConflictExhausted {
        attempts: usize,
        #[source]
        last: StoreError,
    },

    #[error("invalid CIDR {cidr}: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
