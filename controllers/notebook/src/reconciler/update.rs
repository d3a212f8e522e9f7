//! Update path: ID changes on initialized notebooks.
//!
//! The update path never assigns an ID of its own. A valid change moves the
//! notebook's ports with it; an invalid one is reverted and reported.

use super::{ports_status, Reconciler};
use crate::error::ControllerError;
use allocator::{assign_ports, validate_reassignment};
use crds::{NotebookKey, SparkNotebook};
use serde_json::json;
use tracing::{debug, error, info, warn};

impl Reconciler {
    pub async fn reconcile_update(
        &self,
        key: &NotebookKey,
        old: &SparkNotebook,
        new: &SparkNotebook,
    ) -> Result<(), ControllerError> {
        if !new.is_initialized() {
            debug!("SparkNotebook {} not initialized yet, ignoring update", key);
            return Ok(());
        }
        if old.assigned_id() == new.assigned_id() {
            debug!("SparkNotebook {} ID unchanged", key);
            return Ok(());
        }

        let _guard = self.allocation_lock.lock().await;
        let config = self.load_config().await?;
        let (pool, _) = self.observe_pool(Some(key)).await?;

        match validate_reassignment(new.assigned_id(), &key.to_string(), &pool, config.max_id) {
            Ok(id) => {
                let ports = assign_ports(id, config.initial_port);
                if new.ports() == Some(ports) {
                    debug!("SparkNotebook {} already has ports for ID {}", key, id);
                    return Ok(());
                }
                info!(
                    "SparkNotebook {} moved from ID {:?} to {}, ports {:?}",
                    key,
                    old.assigned_id(),
                    id,
                    ports
                );
                match self
                    .store
                    .patch_notebook_status(&key.namespace, &key.name, &ports_status(ports))
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(e) if e.is_not_found() => {
                        info!("SparkNotebook {} deleted during update", key);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(violation) => {
                let err = ControllerError::ConflictingAssignment {
                    name: key.name.clone(),
                    violation,
                };
                error!("{}", err);
                match old.assigned_id() {
                    Some(previous) if pool.contains(previous) => warn!(
                        "SparkNotebook {} cannot be reverted: ID {} is now held by {}",
                        key,
                        previous,
                        pool.holder(previous).unwrap_or("<unknown>")
                    ),
                    Some(previous) => self.revert_id(key, new, previous).await,
                    None => {}
                }
                self.record_error(key, new.status_error(), &err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Puts the previous ID back. Only called while nobody else holds it.
    /// Guarded by the rejected object's resource version, so a newer edit
    /// wins and is validated on its own event.
    async fn revert_id(&self, key: &NotebookKey, rejected: &SparkNotebook, previous: u32) {
        let patch = json!({ "spec": { "id": previous } });
        match self
            .store
            .patch_notebook(&key.namespace, &key.name, &patch, rejected.resource_version())
            .await
        {
            Ok(_) => info!("SparkNotebook {} reverted to ID {}", key, previous),
            Err(e) if e.is_not_found() => info!("SparkNotebook {} deleted before revert", key),
            Err(e) if e.is_conflict() => debug!("SparkNotebook {} changed again, not reverting", key),
            Err(e) => warn!("Failed to revert SparkNotebook {} to ID {}: {}", key, previous, e),
        }
    }
}
