//! SparkNotebook admission checks
//!
//! Only the identifier ceiling is enforced here. Uniqueness is left to the
//! controller, which sees the whole pool; the webhook never lists notebooks.

use crate::settings::WebhookSettings;
use allocator::{validate_ceiling, AllocatorConfig};
use cluster_store::ClusterStore;
use crds::SparkNotebook;
use kube::core::admission::{self, Operation};
use kube::core::DynamicObject;
use kube::Resource;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type AdmissionReview = admission::AdmissionReview<DynamicObject>;
pub type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
pub type AdmissionResponse = admission::AdmissionResponse;

/// Validates SparkNotebook create and update requests against `max-id`.
pub struct AdmissionGuard {
    store: Arc<dyn ClusterStore>,
    operator_namespace: String,
    config_map_name: String,
}

impl AdmissionGuard {
    pub fn new(store: Arc<dyn ClusterStore>, settings: &WebhookSettings) -> Self {
        Self {
            store,
            operator_namespace: settings.operator_namespace.clone(),
            config_map_name: settings.config_map_name.clone(),
        }
    }

    /// Answers a raw `AdmissionReview` body.
    ///
    /// Bodies that do not parse, or carry no request, get an `invalid`
    /// response rather than an HTTP error so the API server reports why.
    pub async fn review(&self, body: &[u8]) -> AdmissionReview {
        let review: AdmissionReview = match serde_json::from_slice(body) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse AdmissionReview");
                return AdmissionResponse::invalid(error).into_review();
            }
        };

        let rsp = match review.try_into() {
            Ok(req) => self.admit(&req).await,
            Err(error) => {
                warn!(%error, "Invalid admission request");
                AdmissionResponse::invalid(error)
            }
        };
        rsp.into_review()
    }

    pub async fn admit(&self, req: &AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(req);

        if !is_spark_notebook(req) {
            return AdmissionResponse::invalid(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
        }
        if !matches!(req.operation, Operation::Create | Operation::Update) {
            return rsp;
        }
        let Some(obj) = req.object.as_ref() else {
            return rsp;
        };

        let id = match requested_id(obj) {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(name = %req.name, "No spec.id requested");
                return rsp;
            }
            Err(reason) => {
                info!(name = %req.name, %reason, "Denied");
                return rsp.deny(reason);
            }
        };

        let max_id = match self.max_id().await {
            Ok(max_id) => max_id,
            Err(reason) => {
                warn!(name = %req.name, %reason, "Cannot read allocator configuration");
                return rsp.deny(reason);
            }
        };

        if let Err(violation) = validate_ceiling(id, max_id) {
            info!(name = %req.name, %violation, "Denied");
            return rsp.deny(violation);
        }
        debug!(name = %req.name, id, max_id, "Allowed");
        rsp
    }

    /// Current `max-id`; a missing ConfigMap means the default.
    async fn max_id(&self) -> Result<u32, String> {
        match self
            .store
            .get_config_map(&self.operator_namespace, &self.config_map_name)
            .await
        {
            Ok(cm) => AllocatorConfig::max_id_from_data(&cm.data.unwrap_or_default()).map_err(|e| e.to_string()),
            Err(e) if e.is_not_found() => Ok(AllocatorConfig::default().max_id),
            Err(e) => Err(format!(
                "Cannot read ConfigMap {}/{}: {}",
                self.operator_namespace, self.config_map_name, e
            )),
        }
    }
}

fn is_spark_notebook(req: &AdmissionRequest) -> bool {
    req.kind.group == SparkNotebook::group(&()) && req.kind.kind == SparkNotebook::kind(&())
}

/// Reads `spec.id` from the submitted object. Null counts as absent.
fn requested_id(obj: &DynamicObject) -> Result<Option<u32>, String> {
    let Some(raw) = obj.data.get("spec").and_then(|spec| spec.get("id")) else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    raw.as_u64()
        .and_then(|id| u32::try_from(id).ok())
        .map(Some)
        .ok_or_else(|| format!("spec.id must be an integer between 0 and {}, got {raw}", u32::MAX))
}
