//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the SparkNotebook
//! watcher to the work queue dispatcher and keeps both running.

use crate::error::ControllerError;
use crate::queue::{work_queue, Dispatcher};
use crate::reconciler::Reconciler;
use crate::settings::OperatorSettings;
use crate::watcher::Watcher;
use cluster_store::KubeClusterStore;
use crds::SparkNotebook;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for SparkNotebook ID management.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    dispatcher: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(settings: OperatorSettings) -> Result<Self, ControllerError> {
        info!("Initializing SparkNotebook Controller");

        let client = Client::try_default().await?;
        let store = Arc::new(KubeClusterStore::new(client.clone()));
        let reconciler = Arc::new(Reconciler::new(store, &settings));

        let api: Api<SparkNotebook> = match settings.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };

        let (tx, rx) = work_queue();
        let dispatcher = Dispatcher::new(
            reconciler,
            settings.worker_concurrency,
            settings.backoff_min,
            settings.backoff_max,
        );

        let watcher = tokio::spawn(Watcher::new(api, tx).run());
        let dispatcher = tokio::spawn(dispatcher.run(rx));

        info!("SparkNotebook Controller initialized");
        Ok(Self { watcher, dispatcher })
    }

    /// Runs the controller until the watcher or the dispatcher stops.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("SparkNotebook Controller running");

        tokio::select! {
            result = &mut self.watcher => {
                self.dispatcher.abort();
                result.map_err(|e| ControllerError::Watch(format!("SparkNotebook watcher panicked: {}", e)))??;
            }
            result = &mut self.dispatcher => {
                self.watcher.abort();
                result.map_err(|e| ControllerError::Watch(format!("Work queue dispatcher panicked: {}", e)))?;
                return Err(ControllerError::Watch("Work queue dispatcher stopped".to_string()));
            }
        }

        Ok(())
    }
}
