//! Access to the pool record, abstracted so contention is simulable.

use async_trait::async_trait;
use gcp_ipam_crds::v1alpha1::ippool::IPPool;
use kube::ResourceExt;
use kube::api::{Api, PostParams};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pool not found: {0}")]
    NotFound(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<IPPool, StoreError>;

    /// Write back a pool read earlier. The pool's `resourceVersion` is the
    /// CAS token; a stale token yields `StoreError::Conflict`.
    async fn update(&self, pool: &IPPool) -> Result<IPPool, StoreError>;

    async fn create(&self, pool: &IPPool) -> Result<IPPool, StoreError>;
}

/// Pool store over the cluster API.
pub struct KubePoolStore {
    api: Api<IPPool>,
}

impl KubePoolStore {
    pub fn new(client: kube::Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }

    fn map_err(name: &str, err: kube::Error) -> StoreError {
        match &err {
            kube::Error::Api(response) if response.code == 404 => {
                StoreError::NotFound(name.to_string())
            }
            kube::Error::Api(response) if response.code == 409 => {
                StoreError::Conflict(response.message.clone())
            }
            _ => StoreError::Kube(err),
        }
    }
}

#[async_trait]
impl PoolStore for KubePoolStore {
    async fn get(&self, name: &str) -> Result<IPPool, StoreError> {
        self.api
            .get(name)
            .await
            .map_err(|e| Self::map_err(name, e))
    }

    async fn update(&self, pool: &IPPool) -> Result<IPPool, StoreError> {
        let name = pool.name_any();
        self.api
            .replace(&name, &PostParams::default(), pool)
            .await
            .map_err(|e| Self::map_err(&name, e))
    }

    async fn create(&self, pool: &IPPool) -> Result<IPPool, StoreError> {
        let name = pool.name_any();
        self.api
            .create(&PostParams::default(), pool)
            .await
            .map_err(|e| Self::map_err(&name, e))
    }
}
