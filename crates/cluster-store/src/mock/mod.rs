//! Mock ClusterStore for unit testing
//!
//! Stores SparkNotebooks and ConfigMaps in memory. Writes bump a
//! resource version, merge patches follow RFC 7386 and the status
//! subresource is kept separate from the main resource, so reconcilers see
//! the same behaviour they get from the API server.
//!
//! Failures can be injected per operation with [`MockClusterStore::fail_next`].

mod helpers;

use crate::error::StoreError;
use crate::store::{with_resource_version, ClusterStore};
use crds::SparkNotebook;
use helpers::{merge_patch, take_resource_version};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operations exposed by [`ClusterStore`], used to record calls and target
/// injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`ClusterStore::list_notebooks`]
    ListNotebooks,
    /// [`ClusterStore::get_notebook`]
    GetNotebook,
    /// [`ClusterStore::patch_notebook`]
    PatchNotebook,
    /// [`ClusterStore::patch_notebook_status`]
    PatchNotebookStatus,
    /// [`ClusterStore::get_config_map`]
    GetConfigMap,
    /// [`ClusterStore::create_config_map`]
    CreateConfigMap,
    /// [`ClusterStore::delete_config_map`]
    DeleteConfigMap,
}

type ObjectKey = (String, String);

/// In-memory [`ClusterStore`]
///
/// Cloning shares the underlying state, so a test can keep a handle while the
/// reconciler under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockClusterStore {
    notebooks: Arc<Mutex<BTreeMap<ObjectKey, SparkNotebook>>>,
    config_maps: Arc<Mutex<BTreeMap<ObjectKey, ConfigMap>>>,
    failures: Arc<Mutex<Vec<(StoreOp, StoreError)>>>,
    calls: Arc<Mutex<Vec<StoreOp>>>,
    next_version: Arc<AtomicU64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &str, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound(format!("{kind} \"{name}\" not found in namespace {namespace}"))
}

impl MockClusterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp(&self, metadata: &mut ObjectMeta) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        metadata.resource_version = Some(version.to_string());
        if metadata.uid.is_none() {
            metadata.uid = Some(format!("00000000-0000-0000-0000-{version:012}"));
        }
    }

    /// Records the call and pops an injected failure for `op`, if any.
    fn begin(&self, op: StoreOp) -> Result<(), StoreError> {
        lock(&self.calls).push(op);
        let mut failures = lock(&self.failures);
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            let (_, err) = failures.remove(pos);
            return Err(err);
        }
        Ok(())
    }

    /// Add a SparkNotebook (for test setup)
    ///
    /// The namespace defaults to `default`. A resource version and uid are
    /// assigned. Returns the stored object.
    pub fn add_notebook(&self, mut notebook: SparkNotebook) -> SparkNotebook {
        let namespace = notebook
            .metadata
            .namespace
            .get_or_insert_with(|| "default".to_string())
            .clone();
        let name = notebook.metadata.name.clone().unwrap_or_default();
        self.stamp(&mut notebook.metadata);
        lock(&self.notebooks).insert(key(&namespace, &name), notebook.clone());
        notebook
    }

    /// Remove a SparkNotebook, as if it had been deleted from the cluster
    pub fn remove_notebook(&self, namespace: &str, name: &str) -> Option<SparkNotebook> {
        lock(&self.notebooks).remove(&key(namespace, name))
    }

    /// Current state of a stored notebook
    pub fn notebook(&self, namespace: &str, name: &str) -> Option<SparkNotebook> {
        lock(&self.notebooks).get(&key(namespace, name)).cloned()
    }

    /// All stored notebooks, ordered by namespace then name
    pub fn notebooks(&self) -> Vec<SparkNotebook> {
        lock(&self.notebooks).values().cloned().collect()
    }

    /// Add a ConfigMap (for test setup). The namespace defaults to `default`.
    pub fn add_config_map(&self, mut config_map: ConfigMap) -> ConfigMap {
        let namespace = config_map
            .metadata
            .namespace
            .get_or_insert_with(|| "default".to_string())
            .clone();
        let name = config_map.metadata.name.clone().unwrap_or_default();
        self.stamp(&mut config_map.metadata);
        lock(&self.config_maps).insert(key(&namespace, &name), config_map.clone());
        config_map
    }

    /// Current state of a stored ConfigMap
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        lock(&self.config_maps).get(&key(namespace, name)).cloned()
    }

    /// Make the next call of `op` fail with `err`
    ///
    /// Several failures may be queued for the same operation; they are
    /// returned in the order they were queued.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        lock(&self.failures).push((op, err));
    }

    /// Every operation invoked so far, in call order
    pub fn calls(&self) -> Vec<StoreOp> {
        lock(&self.calls).clone()
    }

    /// Number of times `op` was invoked
    pub fn call_count(&self, op: StoreOp) -> usize {
        lock(&self.calls).iter().filter(|o| **o == op).count()
    }

    /// Forget recorded calls; injected failures are kept
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }
}

#[async_trait::async_trait]
impl ClusterStore for MockClusterStore {
    async fn list_notebooks(&self) -> Result<Vec<SparkNotebook>, StoreError> {
        self.begin(StoreOp::ListNotebooks)?;
        Ok(self.notebooks())
    }

    async fn get_notebook(&self, namespace: &str, name: &str) -> Result<SparkNotebook, StoreError> {
        self.begin(StoreOp::GetNotebook)?;
        self.notebook(namespace, name)
            .ok_or_else(|| not_found("sparknotebooks", namespace, name))
    }

    async fn patch_notebook(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
        resource_version: Option<&str>,
    ) -> Result<SparkNotebook, StoreError> {
        self.begin(StoreOp::PatchNotebook)?;
        let body = with_resource_version(patch, resource_version)?;
        let (mut body, precondition) = take_resource_version(&body);
        // status is only writable through the subresource
        if let Some(obj) = body.as_object_mut() {
            obj.remove("status");
        }

        let mut notebooks = lock(&self.notebooks);
        let current = notebooks
            .get(&key(namespace, name))
            .ok_or_else(|| not_found("sparknotebooks", namespace, name))?;
        if let Some(expected) = precondition
            && current.resource_version() != Some(expected.as_str())
        {
            return Err(StoreError::Conflict(format!(
                "Operation cannot be fulfilled on sparknotebooks \"{name}\": the object has been modified"
            )));
        }

        let mut value = serde_json::to_value(current)?;
        merge_patch(&mut value, &body);
        let mut updated: SparkNotebook = serde_json::from_value(value)?;
        self.stamp(&mut updated.metadata);
        notebooks.insert(key(namespace, name), updated.clone());
        Ok(updated)
    }

    async fn patch_notebook_status(&self, namespace: &str, name: &str, patch: &Value) -> Result<SparkNotebook, StoreError> {
        self.begin(StoreOp::PatchNotebookStatus)?;
        let mut notebooks = lock(&self.notebooks);
        let current = notebooks
            .get(&key(namespace, name))
            .ok_or_else(|| not_found("sparknotebooks", namespace, name))?;

        let mut value = serde_json::to_value(current)?;
        if let Some(status) = patch.get("status") {
            merge_patch(&mut value, &serde_json::json!({ "status": status }));
        }
        let mut updated: SparkNotebook = serde_json::from_value(value)?;
        self.stamp(&mut updated.metadata);
        notebooks.insert(key(namespace, name), updated.clone());
        Ok(updated)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, StoreError> {
        self.begin(StoreOp::GetConfigMap)?;
        self.config_map(namespace, name)
            .ok_or_else(|| not_found("configmaps", namespace, name))
    }

    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        self.begin(StoreOp::CreateConfigMap)?;
        let name = config_map
            .metadata
            .name
            .clone()
            .ok_or_else(|| StoreError::InvalidObject("ConfigMap has no name".to_string()))?;

        let mut config_maps = lock(&self.config_maps);
        if config_maps.contains_key(&key(namespace, &name)) {
            return Err(StoreError::AlreadyExists(format!(
                "configmaps \"{name}\" already exists"
            )));
        }
        let mut created = config_map.clone();
        created.metadata.namespace = Some(namespace.to_string());
        self.stamp(&mut created.metadata);
        config_maps.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.begin(StoreOp::DeleteConfigMap)?;
        lock(&self.config_maps)
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found("configmaps", namespace, name))
    }
}
