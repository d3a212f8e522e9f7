//! Process settings
//!
//! Read once at startup from environment variables. The allocator settings
//! (`max-id`, `initial-port`) are not here: they live in a ConfigMap and are
//! re-read on every allocation decision.

use crate::error::ControllerError;
use std::time::Duration;

pub const DEFAULT_OPERATOR_NAMESPACE: &str = "mlops-spark-operator";
pub const DEFAULT_CONFIG_MAP_NAME: &str = "mlops-spark-operator-config";
pub const DEFAULT_TEMPLATE_CONFIG_MAP_NAME: &str = "template-configmap";
const DEFAULT_WORKER_CONCURRENCY: usize = 3;
const DEFAULT_BACKOFF_MIN_SECONDS: u64 = 5;
const DEFAULT_BACKOFF_MAX_SECONDS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSettings {
    /// Namespace holding the allocator and template ConfigMaps
    pub operator_namespace: String,
    pub config_map_name: String,
    pub template_config_map_name: String,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Maximum number of SparkNotebooks reconciled at once
    pub worker_concurrency: usize,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            config_map_name: DEFAULT_CONFIG_MAP_NAME.to_string(),
            template_config_map_name: DEFAULT_TEMPLATE_CONFIG_MAP_NAME.to_string(),
            watch_namespace: None,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            backoff_min: Duration::from_secs(DEFAULT_BACKOFF_MIN_SECONDS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECONDS),
        }
    }
}

impl OperatorSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which returns the value of a variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).filter(|v| !v.is_empty()).unwrap_or(default);

        let worker_concurrency = parse_number(&lookup, "WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY as u64)?;
        if worker_concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        let backoff_min = parse_number(&lookup, "BACKOFF_MIN_SECONDS", DEFAULT_BACKOFF_MIN_SECONDS)?;
        let backoff_max = parse_number(&lookup, "BACKOFF_MAX_SECONDS", DEFAULT_BACKOFF_MAX_SECONDS)?;
        if backoff_min == 0 || backoff_min > backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECONDS ({backoff_min}) must be positive and not exceed BACKOFF_MAX_SECONDS ({backoff_max})"
            )));
        }

        Ok(Self {
            operator_namespace: text("OPERATOR_NAMESPACE", defaults.operator_namespace),
            config_map_name: text("CONFIG_MAP_NAME", defaults.config_map_name),
            template_config_map_name: text("TEMPLATE_CONFIG_MAP_NAME", defaults.template_config_map_name),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty()),
            worker_concurrency: usize::try_from(worker_concurrency).map_err(|_| {
                ControllerError::InvalidConfig(format!("WORKER_CONCURRENCY {worker_concurrency} is too large"))
            })?,
            backoff_min: Duration::from_secs(backoff_min),
            backoff_max: Duration::from_secs(backoff_max),
        })
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
    }
}
