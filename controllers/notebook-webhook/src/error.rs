//! Webhook error types

use kube::Error as KubeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the webhook from starting or serving.
///
/// Problems with a single admission request never surface here; they are
/// answered with a denial or an `invalid` admission response instead.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Socket error while binding or accepting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Certificate or key file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    ReadPem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Certificate or key file holds no usable PEM data
    #[error("Invalid PEM in {}: {reason}", path.display())]
    InvalidPem { path: PathBuf, reason: String },

    /// rustls rejected the certificate and key
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid process configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
