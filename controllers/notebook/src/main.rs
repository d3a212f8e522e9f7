//! SparkNotebook Controller
//!
//! Gives every SparkNotebook a cluster-unique integer ID and the three
//! network ports derived from it, and provisions its `{name}-nexus-config`
//! ConfigMap from a template.
//!
//! - Create: assign the smallest free ID, patch spec and status, clone the template
//! - Update: validate ID changes against other holders and the ceiling
//! - Delete: remove the ConfigMap and backfill pending notebooks with the freed ID

mod artifact;
mod backoff;
mod controller;
mod error;
mod queue;
mod reconciler;
mod settings;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::error::ControllerError;
use controller::Controller;
use settings::OperatorSettings;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting SparkNotebook Controller");

    let settings = OperatorSettings::from_env()?;

    info!("Configuration:");
    info!("  Operator namespace: {}", settings.operator_namespace);
    info!("  Allocator ConfigMap: {}", settings.config_map_name);
    info!("  Template ConfigMap: {}", settings.template_config_map_name);
    info!("  Watch namespace: {}", settings.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Workers: {}", settings.worker_concurrency);

    let controller = Controller::new(settings).await?;
    controller.run().await?;

    Ok(())
}
