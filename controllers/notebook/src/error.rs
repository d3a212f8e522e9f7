//! Controller-specific error types.
//!
//! Errors are split into permanent ones, which are reported on the
//! SparkNotebook status and never retried, and transient ones, which the
//! dispatcher retries with backoff.

use allocator::{AllocatorError, IdViolation};
use cluster_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the SparkNotebook Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster read or write failed
    #[error("Cluster store error: {0}")]
    Store(#[from] StoreError),

    /// Allocator ConfigMap holds an unparseable value
    #[error("Allocator configuration error: {0}")]
    Allocator(#[from] AllocatorError),

    /// Every ID up to the ceiling is taken
    #[error("No free ID found below or equal to max-id ({max_id}). Creation of SparkNotebook {name} aborted.")]
    PoolExhausted { name: String, max_id: u32 },

    /// An initialized notebook's ID was changed to an unusable value
    #[error("Cannot update SparkNotebook {name}: {violation}")]
    ConflictingAssignment {
        name: String,
        #[source]
        violation: IdViolation,
    },

    /// The template ConfigMap for derived configuration does not exist
    #[error("Template ConfigMap {namespace}/{name} not found")]
    TemplateMissing { namespace: String, name: String },

    /// The notebook kept changing between reading the pool and writing the ID
    #[error("Could not assign an ID to SparkNotebook {name} after {attempts} attempts")]
    AssignmentContention { name: String, attempts: u32 },

    /// Invalid process configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Permanent errors are not retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ControllerError::PoolExhausted { .. }
                | ControllerError::ConflictingAssignment { .. }
                | ControllerError::TemplateMissing { .. }
                | ControllerError::InvalidConfig(_)
        )
    }
}
