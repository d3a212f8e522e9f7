//! ClusterStore trait
//!
//! Abstracts the Kubernetes API so reconcilers can run against an in-memory
//! fake in unit tests. All async methods must be `Send` to work with Tokio's
//! work-stealing runtime.

use crate::error::StoreError;
use crds::SparkNotebook;
use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::Value;

/// Cluster operations used by the SparkNotebook controller and webhook
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    /// Lists SparkNotebooks in every namespace.
    async fn list_notebooks(&self) -> Result<Vec<SparkNotebook>, StoreError>;

    /// Reads one SparkNotebook.
    async fn get_notebook(&self, namespace: &str, name: &str) -> Result<SparkNotebook, StoreError>;

    /// Applies a JSON merge patch to the notebook (spec and metadata only).
    ///
    /// With `resource_version` set the write only succeeds if the object has
    /// not changed since that version was observed; otherwise it fails with
    /// [`StoreError::Conflict`].
    async fn patch_notebook(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
        resource_version: Option<&str>,
    ) -> Result<SparkNotebook, StoreError>;

    /// Applies a JSON merge patch to the notebook's status subresource.
    async fn patch_notebook_status(&self, namespace: &str, name: &str, patch: &Value) -> Result<SparkNotebook, StoreError>;

    /// Reads one ConfigMap.
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, StoreError>;
    /// Creates a ConfigMap; [`StoreError::AlreadyExists`] if the name is taken.
    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    /// Deletes a ConfigMap.
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Adds a `metadata.resourceVersion` precondition to a merge patch.
///
/// The API server rejects a patch whose resourceVersion does not match the
/// stored object with 409 Conflict.
pub fn with_resource_version(patch: &Value, resource_version: Option<&str>) -> Result<Value, StoreError> {
    let mut body = patch.clone();
    let Some(rv) = resource_version else {
        return Ok(body);
    };
    let obj = body
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidObject("merge patch must be a JSON object".to_string()))?;
    let metadata = obj
        .entry("metadata")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let metadata = metadata
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidObject("patch metadata must be a JSON object".to_string()))?;
    metadata.insert("resourceVersion".to_string(), Value::String(rv.to_string()));
    Ok(body)
}
