//! Kubernetes-backed ClusterStore

use crate::error::StoreError;
use crate::store::{with_resource_version, ClusterStore};
use crds::SparkNotebook;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// [`ClusterStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

// kube::Client does not implement Debug
impl fmt::Debug for KubeClusterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClusterStore").finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    /// Wraps a client. Notebooks are listed across all namespaces.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn notebooks(&self, namespace: &str) -> Api<SparkNotebook> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl ClusterStore for KubeClusterStore {
    async fn list_notebooks(&self) -> Result<Vec<SparkNotebook>, StoreError> {
        let api: Api<SparkNotebook> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        debug!("Listed {} SparkNotebooks", list.items.len());
        Ok(list.items)
    }

    async fn get_notebook(&self, namespace: &str, name: &str) -> Result<SparkNotebook, StoreError> {
        Ok(self.notebooks(namespace).get(name).await?)
    }

    async fn patch_notebook(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
        resource_version: Option<&str>,
    ) -> Result<SparkNotebook, StoreError> {
        let body = with_resource_version(patch, resource_version)?;
        let pp = PatchParams::default();
        Ok(self.notebooks(namespace).patch(name, &pp, &Patch::Merge(&body)).await?)
    }

    async fn patch_notebook_status(&self, namespace: &str, name: &str, patch: &Value) -> Result<SparkNotebook, StoreError> {
        let pp = PatchParams::default();
        Ok(self
            .notebooks(namespace)
            .patch_status(name, &pp, &Patch::Merge(patch))
            .await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, StoreError> {
        Ok(self.config_maps(namespace).get(name).await?)
    }

    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        Ok(self
            .config_maps(namespace)
            .create(&PostParams::default(), config_map)
            .await?)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.config_maps(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
