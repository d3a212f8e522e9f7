//! SparkNotebook reconciliation.
//!
//! A notebook moves through `Pending` (no ID) to `Initialized` (ID, ports and
//! status flag set) and is `Removed` when deleted. Each event kind has its
//! own module:
//!
//! - [`create`]: assign an ID and ports, then provision the derived ConfigMap
//! - [`update`]: validate ID changes on initialized notebooks
//! - [`delete`]: remove the derived ConfigMap and backfill pending notebooks
//!
//! The identifier pool is never stored; it is rebuilt from a cluster-wide
//! listing for every decision. Decisions made by this process are serialized
//! by `allocation_lock`, and writes of a new ID carry the resource version the
//! decision was based on, so a notebook that changed in between is re-read.

mod create;
mod delete;
mod update;

#[cfg(test)]
mod delete_test;

use crate::artifact::derive_artifact;
use crate::error::ControllerError;
use crate::queue::{EventHandler, NotebookEvent, WorkItem};
use crate::settings::OperatorSettings;
use allocator::{AllocationPool, AllocatorConfig, PortTriple};
use cluster_store::{ClusterStore, StoreError};
use crds::{NotebookKey, SparkNotebook};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reconciles SparkNotebook events against the cluster.
pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    operator_namespace: String,
    config_map_name: String,
    template_config_map_name: String,
    allocation_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ClusterStore>, settings: &OperatorSettings) -> Self {
        Self {
            store,
            operator_namespace: settings.operator_namespace.clone(),
            config_map_name: settings.config_map_name.clone(),
            template_config_map_name: settings.template_config_map_name.clone(),
            allocation_lock: Mutex::new(()),
        }
    }

    /// Reads `max-id` and `initial-port`. A missing ConfigMap means defaults.
    async fn load_config(&self) -> Result<AllocatorConfig, ControllerError> {
        match self
            .store
            .get_config_map(&self.operator_namespace, &self.config_map_name)
            .await
        {
            Ok(cm) => Ok(AllocatorConfig::from_data(&cm.data.unwrap_or_default())?),
            Err(e) if e.is_not_found() => {
                debug!(
                    "ConfigMap {}/{} not found, using default allocator settings",
                    self.operator_namespace, self.config_map_name
                );
                Ok(AllocatorConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every notebook in the cluster and builds the pool of held IDs.
    ///
    /// `exclude` leaves one notebook out, so its own ID does not count
    /// against it.
    async fn observe_pool(
        &self,
        exclude: Option<&NotebookKey>,
    ) -> Result<(AllocationPool, Vec<SparkNotebook>), ControllerError> {
        let notebooks = self.store.list_notebooks().await?;
        let pool = AllocationPool::from_holders(notebooks.iter().filter_map(|nb| {
            let key = nb.key()?;
            if exclude == Some(&key) {
                return None;
            }
            Some((nb.assigned_id()?, key.to_string()))
        }));
        for (id, holder) in pool.duplicates() {
            warn!(
                "ID {} is held by both {} and {}",
                id,
                pool.holder(*id).unwrap_or("<unknown>"),
                holder
            );
        }
        Ok((pool, notebooks))
    }

    /// Writes `id` into the notebook's spec and marks it initialized.
    ///
    /// The spec write only succeeds if the notebook still has the resource
    /// version of `observed`. Returns `None` if the notebook is gone.
    async fn apply_assignment(
        &self,
        key: &NotebookKey,
        observed: &SparkNotebook,
        id: u32,
        ports: PortTriple,
    ) -> Result<Option<SparkNotebook>, StoreError> {
        let spec_patch = json!({ "spec": { "id": id } });
        match self
            .store
            .patch_notebook(&key.namespace, &key.name, &spec_patch, observed.resource_version())
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("SparkNotebook {} was deleted before ID {} could be assigned", key, id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        match self
            .store
            .patch_notebook_status(&key.namespace, &key.name, &initialized_status(ports))
            .await
        {
            Ok(updated) => {
                info!("SparkNotebook {} assigned ID {} with ports {:?}", key, id, ports);
                Ok(Some(updated))
            }
            Err(e) if e.is_not_found() => {
                info!("SparkNotebook {} was deleted before its status could be set", key);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Creates the derived ConfigMap from the template if it does not exist.
    async fn ensure_artifact(&self, key: &NotebookKey, owner: &SparkNotebook) -> Result<(), ControllerError> {
        let template = match self
            .store
            .get_config_map(&self.operator_namespace, &self.template_config_map_name)
            .await
        {
            Ok(template) => template,
            Err(e) if e.is_not_found() => {
                let err = ControllerError::TemplateMissing {
                    namespace: self.operator_namespace.clone(),
                    name: self.template_config_map_name.clone(),
                };
                self.record_error(key, owner.status_error(), &err.to_string()).await;
                return Err(err);
            }
            Err(e) => return Err(e.into()),
        };

        let artifact = derive_artifact(&template, owner, key);
        match self.store.create_config_map(&key.namespace, &artifact).await {
            Ok(_) => {
                info!("Created ConfigMap {}/{}", key.namespace, key.artifact_name());
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!("ConfigMap {}/{} already exists", key.namespace, key.artifact_name());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Records a permanent failure on the notebook's status.
    ///
    /// Skips the write if the same message is already set. Failures are only
    /// logged so they do not mask the error being reported.
    async fn record_error(&self, key: &NotebookKey, current: Option<&str>, message: &str) {
        if current == Some(message) {
            debug!("SparkNotebook {} already reports: {}", key, message);
            return;
        }
        match self
            .store
            .patch_notebook_status(&key.namespace, &key.name, &error_status(message))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("SparkNotebook {} is gone, not recording error", key);
            }
            Err(e) => warn!("Failed to record error on SparkNotebook {}: {}", key, e),
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for Reconciler {
    async fn handle(&self, item: &WorkItem) -> Result<(), ControllerError> {
        match &item.event {
            NotebookEvent::Create(_) => self.reconcile_create(&item.key).await,
            NotebookEvent::Update { old, new } => self.reconcile_update(&item.key, old, new).await,
            NotebookEvent::Delete(deleted) => self.reconcile_delete(&item.key, deleted).await,
        }
    }
}

fn initialized_status(ports: PortTriple) -> Value {
    json!({
        "status": {
            "initialized": true,
            "ports": ports,
            "error": null
        }
    })
}

fn ports_status(ports: PortTriple) -> Value {
    json!({
        "status": {
            "ports": ports,
            "error": null
        }
    })
}

fn error_status(message: &str) -> Value {
    json!({
        "status": {
            "error": message
        }
    })
}
