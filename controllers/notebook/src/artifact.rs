//! Derived per-notebook ConfigMap.

use crds::{NotebookKey, SparkNotebook};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Clones `template` as `{name}-nexus-config` in the notebook's namespace.
///
/// Data, binary data, labels and annotations are carried over. Server-managed
/// metadata is dropped and the notebook becomes the controlling owner, so the
/// ConfigMap is garbage collected with it.
pub fn derive_artifact(template: &ConfigMap, owner: &SparkNotebook, key: &NotebookKey) -> ConfigMap {
    let mut annotations = template.metadata.annotations.clone().unwrap_or_default();
    annotations.remove(LAST_APPLIED_ANNOTATION);

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(key.artifact_name()),
            namespace: Some(key.namespace.clone()),
            labels: template.metadata.labels.clone(),
            annotations: (!annotations.is_empty()).then_some(annotations),
            owner_references: owner.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        data: template.data.clone(),
        binary_data: template.binary_data.clone(),
        immutable: template.immutable,
    }
}
