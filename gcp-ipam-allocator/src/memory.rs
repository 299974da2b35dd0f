//! In-memory pool store with real version-token CAS, for unit tests.
//! Conflicts can be staged to simulate a competing writer landing between a
//! reader's get and its write-back.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gcp_ipam_crds::v1alpha1::ippool::IPPool;
use kube::ResourceExt;

use crate::store::{PoolStore, StoreError};

type PoolMutation = Box<dyn FnOnce(&mut IPPool) + Send>;

#[derive(Clone)]
pub struct MemoryPoolStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    pools: HashMap<String, IPPool>,
    staged_conflicts: VecDeque<Option<PoolMutation>>,
    version: u64,
}

impl MemoryPoolStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Seed a pool, stamping a fresh version token.
    pub fn put(&self, mut pool: IPPool) {
        let mut inner = self.inner.lock().unwrap();
        inner.version += 1;
        pool.metadata.resource_version = Some(inner.version.to_string());
        inner.pools.insert(pool.name_any(), pool);
    }

    pub fn pool(&self, name: &str) -> Option<IPPool> {
        self.inner.lock().unwrap().pools.get(name).cloned()
    }

    pub fn remove(&self, name: &str) {
        self.inner.lock().unwrap().pools.remove(name);
    }

    /// Make the next update fail with a conflict, leaving the pool as-is.
    pub fn queue_conflict(&self) {
        self.inner.lock().unwrap().staged_conflicts.push_back(None);
    }

    /// Make the next update fail with a conflict after `mutate` has been
    /// applied as the competing write (with its own version bump).
    pub fn queue_conflict_with<F>(&self, mutate: F)
    where
        F: FnOnce(&mut IPPool) + Send + 'static,
    {
        self.inner
            .lock()
            .unwrap()
            .staged_conflicts
            .push_back(Some(Box::new(mutate)));
    }
}

impl Default for MemoryPoolStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    async fn get(&self, name: &str) -> Result<IPPool, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .pools
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update(&self, pool: &IPPool) -> Result<IPPool, StoreError> {
        let name = pool.name_any();
        let mut inner = self.inner.lock().unwrap();

        if let Some(staged) = inner.staged_conflicts.pop_front() {
            if let Some(mutate) = staged {
                inner.version += 1;
                let version = inner.version;
                if let Some(stored) = inner.pools.get_mut(&name) {
                    mutate(stored);
                    stored.metadata.resource_version = Some(version.to_string());
                }
            }
            return Err(StoreError::Conflict(format!(
                "simulated concurrent update of {name}"
            )));
        }

        let stored_version = inner
            .pools
            .get(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?
            .metadata
            .resource_version
            .clone();
        if pool.metadata.resource_version != stored_version {
            return Err(StoreError::Conflict(format!(
                "stale resourceVersion for {name}"
            )));
        }

        inner.version += 1;
        let mut updated = pool.clone();
        updated.metadata.resource_version = Some(inner.version.to_string());
        inner.pools.insert(name, updated.clone());
        Ok(updated)
    }

    async fn create(&self, pool: &IPPool) -> Result<IPPool, StoreError> {
        let name = pool.name_any();
        let mut inner = self.inner.lock().unwrap();
        if inner.pools.contains_key(&name) {
            return Err(StoreError::Conflict(format!("pool {name} already exists")));
        }
        inner.version += 1;
        let mut created = pool.clone();
        created.metadata.resource_version = Some(inner.version.to_string());
        inner.pools.insert(name, created.clone());
        Ok(created)
    }
}
