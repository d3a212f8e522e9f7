//! Cluster store errors

use thiserror::Error;

/// Errors returned by [`crate::ClusterStore`] operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A resource-version precondition failed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Create of an object that already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other API status
    #[error("Kubernetes API error ({code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Status message from the API server
        message: String,
    },

    /// Transport or client-side failure
    #[error("Kubernetes client error: {0}")]
    Kube(#[source] kube::Error),

    /// A patch or object could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The object or patch is malformed
    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl StoreError {
    /// Classifies a kube client error by API status code and reason.
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(status) => match status.code {
                404 => StoreError::NotFound(status.message.clone()),
                409 if status.reason == "AlreadyExists" => StoreError::AlreadyExists(status.message.clone()),
                409 => StoreError::Conflict(status.message.clone()),
                code => StoreError::Api {
                    code,
                    message: status.message.clone(),
                },
            },
            other => StoreError::Kube(other),
        }
    }

    /// The object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// A resource-version precondition failed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// The object to create already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        StoreError::from_kube(err)
    }
}
