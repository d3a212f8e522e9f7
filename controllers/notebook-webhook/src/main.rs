//! SparkNotebook Admission Webhook
//!
//! Rejects SparkNotebook creates and updates whose `spec.id` is above the
//! configured `max-id`, before they are persisted.

mod admission;
mod error;
mod server;
mod settings;
mod tls;

use crate::admission::AdmissionGuard;
use crate::error::WebhookError;
use cluster_store::KubeClusterStore;
use kube::Client;
use settings::WebhookSettings;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), WebhookError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting SparkNotebook Admission Webhook");

    let settings = WebhookSettings::from_env()?;

    info!("Configuration:");
    info!("  Operator namespace: {}", settings.operator_namespace);
    info!("  Allocator ConfigMap: {}", settings.config_map_name);
    info!("  Listen address: {}", settings.listen_addr);
    info!("  TLS certificate: {}", settings.tls_cert_path.display());

    let client = Client::try_default().await?;
    let store = Arc::new(KubeClusterStore::new(client));
    let guard = Arc::new(AdmissionGuard::new(store, &settings));

    let acceptor = tls::load_acceptor(&settings.tls_cert_path, &settings.tls_key_path)?;
    let listener = TcpListener::bind(settings.listen_addr).await?;

    server::serve(listener, acceptor, server::router(guard)).await
}
