//! SparkNotebook CRD
//!
//! A notebook workload that receives a cluster-unique identifier and a
//! triple of network ports derived from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to a notebook name to form its derived ConfigMap name.
pub const ARTIFACT_SUFFIX: &str = "-nexus-config";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[kube(
    group = "mlops.example.com",
    version = "v1",
    kind = "SparkNotebook",
    plural = "sparknotebooks",
    shortname = "snb",
    namespaced,
    status = "SparkNotebookStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"ID","type":"integer","jsonPath":".spec.id"}"#,
    printcolumn = r#"{"name":"Initialized","type":"boolean","jsonPath":".status.initialized"}"#
)]
#[serde(rename_all = "camelCase")]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct SparkNotebookSpec {
    /// Cluster-unique identifier, assigned by the controller when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SparkNotebookStatus {
    /// Set once the controller has assigned an ID and ports
    #[serde(default)]
    pub initialized: bool,

    /// Three consecutive ports derived from the ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<[u64; 3]>,

    /// Last permanent failure reported by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Namespace/name identity of a SparkNotebook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotebookKey {
    pub namespace: String,
    pub name: String,
}

impl NotebookKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Name of the ConfigMap derived for this notebook.
    pub fn artifact_name(&self) -> String {
        artifact_name(&self.name)
    }
}

impl fmt::Display for NotebookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Builds the derived ConfigMap name for a notebook.
pub fn artifact_name(notebook_name: &str) -> String {
    format!("{notebook_name}{ARTIFACT_SUFFIX}")
}

impl SparkNotebook {
    /// Returns the namespace/name key, or `None` if the object has no name.
    ///
    /// Objects without a namespace fall back to `default`.
    pub fn key(&self) -> Option<NotebookKey> {
        let name = self.metadata.name.as_ref()?;
        let namespace = self.metadata.namespace.as_deref().unwrap_or("default");
        Some(NotebookKey::new(namespace, name.as_str()))
    }

    pub fn assigned_id(&self) -> Option<u32> {
        self.spec.id
    }

    pub fn is_initialized(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.initialized)
    }

    pub fn ports(&self) -> Option<[u64; 3]> {
        self.status.as_ref().and_then(|s| s.ports)
    }

    pub fn status_error(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.error.as_deref())
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}
