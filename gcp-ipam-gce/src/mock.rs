//! In-memory `ComputeApi` for unit tests. Stores resources keyed by name,
//! applies interface updates and subnetwork patches to the stored state, and
//! completes operations immediately unless a test stages one explicitly.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::compute::ComputeApi;
use crate::error::Error;
use crate::models::{GlobalOperation, Instance, InternalRange, NetworkInterface, Operation, Subnetwork};
use crate::Result;

const DEFAULT_AUTO_RANGE_CIDR: &str = "10.100.0.0/16";

/// One recorded `update_network_interface` call, in call order.
#[derive(Clone, Debug)]
pub struct InterfaceUpdate {
    pub instance: String,
    pub interface: String,
    pub update: NetworkInterface,
}

#[derive(Clone)]
pub struct MockCompute {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    instances: HashMap<String, Instance>,
    subnetworks: HashMap<String, Subnetwork>,
    internal_ranges: HashMap<String, InternalRange>,
    operations: HashMap<String, Operation>,
    interface_updates: Vec<InterfaceUpdate>,
    subnetwork_patches: Vec<Subnetwork>,
    fail_interface_updates: VecDeque<String>,
    created_internal_ranges: usize,
    next_op: u64,
}

impl MockCompute {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn put_instance(&self, instance: Instance) {
        let mut inner = self.inner.lock().unwrap();
        inner.instances.insert(instance.name.clone(), instance);
    }

    pub fn put_subnetwork(&self, subnetwork: Subnetwork) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .subnetworks
            .insert(subnetwork.name.clone(), subnetwork);
    }

    pub fn put_internal_range(&self, range: InternalRange) {
        let mut inner = self.inner.lock().unwrap();
        inner.internal_ranges.insert(range.name.clone(), range);
    }

    /// Stage a zone/region operation by name; polls return it as stored.
    pub fn put_zone_operation(&self, operation: Operation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.insert(operation.name.clone(), operation);
    }

    /// Make the next `update_network_interface` call fail.
    pub fn fail_next_interface_update(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_interface_updates.push_back(message.into());
    }

    pub fn instance(&self, name: &str) -> Option<Instance> {
        self.inner.lock().unwrap().instances.get(name).cloned()
    }

    pub fn subnetwork(&self, name: &str) -> Option<Subnetwork> {
        self.inner.lock().unwrap().subnetworks.get(name).cloned()
    }

    pub fn internal_range(&self, name: &str) -> Option<InternalRange> {
        self.inner
            .lock()
            .unwrap()
            .internal_ranges
            .get(name)
            .cloned()
    }

    pub fn interface_updates(&self) -> Vec<InterfaceUpdate> {
        self.inner.lock().unwrap().interface_updates.clone()
    }

    pub fn subnetwork_patches(&self) -> Vec<Subnetwork> {
        self.inner.lock().unwrap().subnetwork_patches.clone()
    }

    pub fn created_internal_ranges(&self) -> usize {
        self.inner.lock().unwrap().created_internal_ranges
    }
}

impl Default for MockCompute {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeApi for MockCompute {
    async fn get_instance(&self, _project: &str, _zone: &str, instance: &str) -> Result<Instance> {
        self.inner
            .lock()
            .unwrap()
            .instances
            .get(instance)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("instance {instance}")))
    }

    async fn get_subnetwork(
        &self,
        _project: &str,
        _region: &str,
        subnetwork: &str,
    ) -> Result<Subnetwork> {
        self.inner
            .lock()
            .unwrap()
            .subnetworks
            .get(subnetwork)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("subnetwork {subnetwork}")))
    }

    async fn patch_subnetwork(
        &self,
        _project: &str,
        _region: &str,
        subnetwork: &str,
        patch: &Subnetwork,
    ) -> Result<Operation> {
        let mut inner = self.inner.lock().unwrap();
        inner.subnetwork_patches.push(patch.clone());
        if let Some(stored) = inner.subnetworks.get_mut(subnetwork) {
            if !patch.secondary_ip_ranges.is_empty() {
                stored.secondary_ip_ranges = patch.secondary_ip_ranges.clone();
            }
        }
        inner.next_op += 1;
        Ok(Operation {
            name: format!("op-{}", inner.next_op),
            status: "DONE".into(),
            error: None,
        })
    }

    async fn update_network_interface(
        &self,
        _project: &str,
        _zone: &str,
        instance: &str,
        interface: &str,
        update: &NetworkInterface,
    ) -> Result<Operation> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = inner.fail_interface_updates.pop_front() {
            return Err(Error::Api {
                status: 412,
                message,
            });
        }
        inner.interface_updates.push(InterfaceUpdate {
            instance: instance.to_string(),
            interface: interface.to_string(),
            update: update.clone(),
        });
        if let Some(stored) = inner.instances.get_mut(instance) {
            if let Some(stored_interface) = stored
                .network_interfaces
                .iter_mut()
                .find(|i| i.name == interface)
            {
                stored_interface.alias_ip_ranges = update.alias_ip_ranges.clone();
            }
        }
        inner.next_op += 1;
        Ok(Operation {
            name: format!("op-{}", inner.next_op),
            status: "DONE".into(),
            error: None,
        })
    }

    async fn get_zone_operation(
        &self,
        _project: &str,
        _zone: &str,
        operation: &str,
    ) -> Result<Operation> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| Operation {
                name: operation.to_string(),
                status: "DONE".into(),
                error: None,
            }))
    }

    async fn get_region_operation(
        &self,
        project: &str,
        _region: &str,
        operation: &str,
    ) -> Result<Operation> {
        self.get_zone_operation(project, "", operation).await
    }

    async fn get_internal_range(&self, _project: &str, name: &str) -> Result<InternalRange> {
        self.inner
            .lock()
            .unwrap()
            .internal_ranges
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("internal range {name}")))
    }

    async fn create_internal_range(
        &self,
        project: &str,
        name: &str,
        range: &InternalRange,
    ) -> Result<GlobalOperation> {
        let mut inner = self.inner.lock().unwrap();
        let mut created = range.clone();
        created.name = name.to_string();
        if created.ip_cidr_range.is_empty() {
            created.ip_cidr_range = DEFAULT_AUTO_RANGE_CIDR.to_string();
        }
        inner.internal_ranges.insert(name.to_string(), created);
        inner.created_internal_ranges += 1;
        inner.next_op += 1;
        Ok(GlobalOperation {
            name: format!(
                "projects/{project}/locations/global/operations/op-{}",
                inner.next_op
            ),
            done: true,
            error: None,
        })
    }

    async fn get_global_operation(&self, name: &str) -> Result<GlobalOperation> {
        Ok(GlobalOperation {
            name: name.to_string(),
            done: true,
            error: None,
        })
    }
}
