//! Create path: `Pending` -> `Initialized`.

use super::Reconciler;
use crate::error::ControllerError;
use allocator::{assign_ports, validate_ceiling};
use crds::{NotebookKey, SparkNotebook};
use tracing::{debug, error, info, warn};

/// Attempts at writing an ID before giving up on a notebook that keeps changing.
const MAX_ASSIGN_ATTEMPTS: u32 = 3;

impl Reconciler {
    pub async fn reconcile_create(&self, key: &NotebookKey) -> Result<(), ControllerError> {
        let notebook = match self.store.get_notebook(&key.namespace, &key.name).await {
            Ok(nb) => nb,
            Err(e) if e.is_not_found() => {
                info!("SparkNotebook {} no longer exists, skipping create", key);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let notebook = if notebook.is_initialized() {
            debug!(
                "SparkNotebook {} already initialized with ID {:?}",
                key,
                notebook.assigned_id()
            );
            notebook
        } else {
            match self.assign(key, notebook).await? {
                Some(nb) => nb,
                None => return Ok(()),
            }
        };

        self.ensure_artifact(key, &notebook).await
    }

    /// Picks an ID for a pending notebook and writes it.
    ///
    /// A preset `spec.id` is kept when it is within the ceiling and nobody
    /// else holds it; otherwise the smallest free ID is used. Returns `None`
    /// if the notebook disappeared.
    async fn assign(&self, key: &NotebookKey, mut observed: SparkNotebook) -> Result<Option<SparkNotebook>, ControllerError> {
        for attempt in 1..=MAX_ASSIGN_ATTEMPTS {
            let guard = self.allocation_lock.lock().await;
            let config = self.load_config().await?;
            let (pool, _) = self.observe_pool(Some(key)).await?;

            let preset = observed
                .assigned_id()
                .filter(|id| !pool.contains(*id) && validate_ceiling(*id, config.max_id).is_ok());
            let id = match preset {
                Some(id) => {
                    info!("SparkNotebook {} keeps requested ID {}", key, id);
                    id
                }
                None => {
                    if let Some(requested) = observed.assigned_id() {
                        warn!(
                            "SparkNotebook {} requested ID {} which is unavailable, assigning a free ID",
                            key, requested
                        );
                    }
                    match pool.next_free(config.max_id) {
                        Some(id) => id,
                        None => {
                            drop(guard);
                            let err = ControllerError::PoolExhausted {
                                name: key.name.clone(),
                                max_id: config.max_id,
                            };
                            error!("{}", err);
                            self.record_error(key, observed.status_error(), &err.to_string())
                                .await;
                            return Err(err);
                        }
                    }
                }
            };

            let ports = assign_ports(id, config.initial_port);
            match self.apply_assignment(key, &observed, id, ports).await {
                Ok(assigned) => return Ok(assigned),
                Err(e) if e.is_conflict() => {
                    drop(guard);
                    warn!(
                        "SparkNotebook {} changed while assigning ID {} (attempt {}/{})",
                        key, id, attempt, MAX_ASSIGN_ATTEMPTS
                    );
                    observed = match self.store.get_notebook(&key.namespace, &key.name).await {
                        Ok(nb) => nb,
                        Err(e) if e.is_not_found() => return Ok(None),
                        Err(e) => return Err(e.into()),
                    };
                    if observed.is_initialized() {
                        debug!("SparkNotebook {} was initialized concurrently", key);
                        return Ok(Some(observed));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ControllerError::AssignmentContention {
            name: key.name.clone(),
            attempts: MAX_ASSIGN_ATTEMPTS,
        })
    }
}
