//! Cluster State Store
//!
//! Narrow access to the cluster objects the SparkNotebook controllers read
//! and write: the SparkNotebook resources themselves and the ConfigMaps that
//! hold allocator settings, templates and derived per-notebook configuration.
//!
//! # Example
//!
//! ```no_run
//! use cluster_store::{ClusterStore, KubeClusterStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeClusterStore::new(client);
//!
//! // Every notebook in the cluster, used to rebuild the identifier pool
//! let notebooks = store.list_notebooks().await?;
//!
//! // Allocator settings
//! let config = store.get_config_map("mlops-spark-operator", "mlops-spark-operator-config").await?;
//! # Ok(())
//! # }
//! ```
//!
//! The [`ClusterStore`] trait is what the controllers depend on. Tests use
//! [`MockClusterStore`] (feature `test-util`), an in-memory fake that applies
//! merge patches and resource-version preconditions like the API server does.

pub mod error;
pub mod kube_store;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod store;

pub use error::StoreError;
pub use kube_store::KubeClusterStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterStore, StoreOp};
pub use store::{with_resource_version, ClusterStore};
