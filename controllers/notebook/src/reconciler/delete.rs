//! Delete path: artifact cleanup and backfill sweep.

use super::Reconciler;
use crate::error::ControllerError;
use allocator::assign_ports;
use crds::{NotebookKey, SparkNotebook};
use tracing::{debug, info, warn};

impl Reconciler {
    pub async fn reconcile_delete(&self, key: &NotebookKey, deleted: &SparkNotebook) -> Result<(), ControllerError> {
        let artifact = key.artifact_name();
        match self.store.delete_config_map(&key.namespace, &artifact).await {
            Ok(()) => info!("Deleted ConfigMap {}/{}", key.namespace, artifact),
            Err(e) if e.is_not_found() => info!("ConfigMap {}/{} already gone", key.namespace, artifact),
            Err(e) => return Err(e.into()),
        }

        let Some(freed) = deleted.assigned_id() else {
            debug!("SparkNotebook {} held no ID, skipping backfill", key);
            return Ok(());
        };
        info!("SparkNotebook {} released ID {}", key, freed);
        self.backfill(key, freed).await
    }

    /// Assigns free IDs to pending notebooks, in listing order.
    ///
    /// The pool is updated after each assignment so two notebooks in one
    /// sweep never get the same ID. A failure on one notebook is logged and
    /// the sweep moves on.
    async fn backfill(&self, deleted: &NotebookKey, freed: u32) -> Result<(), ControllerError> {
        let _guard = self.allocation_lock.lock().await;
        let config = self.load_config().await?;
        let (mut pool, notebooks) = self.observe_pool(None).await?;

        // A stale listing can still show the deleted notebook
        let deleted_holder = deleted.to_string();
        if pool.holder(freed) == Some(deleted_holder.as_str()) {
            pool.release(freed);
        }

        let pending: Vec<&SparkNotebook> = notebooks
            .iter()
            .filter(|nb| nb.assigned_id().is_none() && !nb.is_initialized())
            .filter(|nb| nb.key().as_ref() != Some(deleted))
            .collect();
        if pending.is_empty() {
            debug!("No pending SparkNotebooks to backfill");
            return Ok(());
        }
        info!("Backfilling {} pending SparkNotebook(s)", pending.len());

        for notebook in pending {
            let Some(key) = notebook.key() else {
                continue;
            };
            let Some(id) = pool.next_free(config.max_id) else {
                warn!(
                    "No free ID below or equal to max-id ({}) for SparkNotebook {}",
                    config.max_id, key
                );
                continue;
            };
            pool.claim(id, key.to_string());

            let ports = assign_ports(id, config.initial_port);
            let assigned = match self.apply_assignment(&key, notebook, id, ports).await {
                Ok(Some(nb)) => nb,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to backfill SparkNotebook {} with ID {}: {}", key, id, e);
                    continue;
                }
            };
            if let Err(e) = self.ensure_artifact(&key, &assigned).await {
                warn!("Failed to provision ConfigMap for SparkNotebook {}: {}", key, e);
            }
        }

        Ok(())
    }
}
