//! Notebook Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the notebook controller
//! and its admission webhook.

pub mod spark_notebook;

pub use spark_notebook::*;
