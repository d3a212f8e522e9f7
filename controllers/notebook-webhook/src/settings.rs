//! Process settings, read once at startup from environment variables

use crate::error::WebhookError;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_OPERATOR_NAMESPACE: &str = "mlops-spark-operator";
pub const DEFAULT_CONFIG_MAP_NAME: &str = "mlops-spark-operator-config";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:443";
const DEFAULT_TLS_CERT_PATH: &str = "/etc/tls/tls.crt";
const DEFAULT_TLS_KEY_PATH: &str = "/etc/tls/tls.key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    /// Namespace holding the allocator ConfigMap
    pub operator_namespace: String,
    pub config_map_name: String,
    pub listen_addr: SocketAddr,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            config_map_name: DEFAULT_CONFIG_MAP_NAME.to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 443)),
            tls_cert_path: PathBuf::from(DEFAULT_TLS_CERT_PATH),
            tls_key_path: PathBuf::from(DEFAULT_TLS_KEY_PATH),
        }
    }
}

impl WebhookSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, WebhookError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which returns the value of a variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WebhookError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let raw_addr = text("WEBHOOK_ADDR", DEFAULT_LISTEN_ADDR);
        let listen_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| WebhookError::InvalidConfig(format!("WEBHOOK_ADDR={raw_addr:?}: {e}")))?;

        Ok(Self {
            operator_namespace: text("OPERATOR_NAMESPACE", DEFAULT_OPERATOR_NAMESPACE),
            config_map_name: text("CONFIG_MAP_NAME", DEFAULT_CONFIG_MAP_NAME),
            listen_addr,
            tls_cert_path: PathBuf::from(text("TLS_CERT_PATH", DEFAULT_TLS_CERT_PATH)),
            tls_key_path: PathBuf::from(text("TLS_KEY_PATH", DEFAULT_TLS_KEY_PATH)),
        })
    }
}
