//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::Reconciler;
use crate::settings::{OperatorSettings, DEFAULT_CONFIG_MAP_NAME, DEFAULT_OPERATOR_NAMESPACE, DEFAULT_TEMPLATE_CONFIG_MAP_NAME};
use allocator::assign_ports;
use cluster_store::MockClusterStore;
use crds::{NotebookKey, SparkNotebook, SparkNotebookSpec, SparkNotebookStatus};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_NAMESPACE: &str = "team";

/// Helper to create a test SparkNotebook without status
pub fn create_test_notebook(name: &str, id: Option<u32>) -> SparkNotebook {
    let mut nb = SparkNotebook::new(name, SparkNotebookSpec { id });
    nb.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    nb
}

/// Helper to create an initialized test SparkNotebook with ports for `initial_port`
pub fn create_test_initialized_notebook(name: &str, id: u32, initial_port: u32) -> SparkNotebook {
    let mut nb = create_test_notebook(name, Some(id));
    nb.status = Some(SparkNotebookStatus {
        initialized: true,
        ports: Some(assign_ports(id, initial_port)),
        error: None,
    });
    nb
}

/// Helper to create the allocator ConfigMap
pub fn create_test_allocator_config(data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(DEFAULT_CONFIG_MAP_NAME.to_string()),
            namespace: Some(DEFAULT_OPERATOR_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Helper to create the template ConfigMap
pub fn create_test_template() -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(DEFAULT_TEMPLATE_CONFIG_MAP_NAME.to_string()),
            namespace: Some(DEFAULT_OPERATOR_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "nexus.properties".to_string(),
            "application-port=8081".to_string(),
        )])),
        ..Default::default()
    }
}

/// Helper to create a store holding the allocator ConfigMap and the template
pub fn create_test_store(max_id: u32, initial_port: u32) -> MockClusterStore {
    let store = MockClusterStore::new();
    store.add_config_map(create_test_allocator_config(&[
        ("max-id", &max_id.to_string()),
        ("initial-port", &initial_port.to_string()),
    ]));
    store.add_config_map(create_test_template());
    store
}

/// Helper to create a reconciler over `store` with default settings
pub fn create_test_reconciler(store: &MockClusterStore) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()), &OperatorSettings::default())
}

pub fn key(name: &str) -> NotebookKey {
    NotebookKey::new(TEST_NAMESPACE, name)
}

/// Current state of a notebook in the store
pub fn stored(store: &MockClusterStore, name: &str) -> SparkNotebook {
    store
        .notebook(TEST_NAMESPACE, name)
        .unwrap_or_else(|| panic!("SparkNotebook {name} missing from store"))
}
