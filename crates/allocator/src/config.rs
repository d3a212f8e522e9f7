//! Allocator configuration
//!
//! Values live in a ConfigMap as string-encoded integers and are re-read on
//! every decision, so edits take effect on the next event.

use crate::error::AllocatorError;
use std::collections::BTreeMap;

/// ConfigMap key holding the inclusive identifier ceiling
pub const MAX_ID_KEY: &str = "max-id";
/// ConfigMap key holding the port base
pub const INITIAL_PORT_KEY: &str = "initial-port";

/// Ceiling used when `max-id` is not set
pub const DEFAULT_MAX_ID: u32 = 1000;
/// Port base used when `initial-port` is not set
pub const DEFAULT_INITIAL_PORT: u32 = 8100;

/// Identifier ceiling and port base read from the operator ConfigMap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Largest identifier that may be assigned
    pub max_id: u32,
    /// First port of identifier 0's block
    pub initial_port: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_id: DEFAULT_MAX_ID,
            initial_port: DEFAULT_INITIAL_PORT,
        }
    }
}

impl AllocatorConfig {
    /// Reads the configuration from ConfigMap data.
    ///
    /// Missing keys fall back to their defaults. Present keys must parse as
    /// non-negative integers; surrounding whitespace is ignored.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self, AllocatorError> {
        Ok(Self {
            max_id: parse_key(data, MAX_ID_KEY, DEFAULT_MAX_ID)?,
            initial_port: parse_key(data, INITIAL_PORT_KEY, DEFAULT_INITIAL_PORT)?,
        })
    }

    /// Reads only the ceiling. Used by the admission webhook, which never
    /// computes ports and must not reject requests over a bad `initial-port`.
    pub fn max_id_from_data(data: &BTreeMap<String, String>) -> Result<u32, AllocatorError> {
        parse_key(data, MAX_ID_KEY, DEFAULT_MAX_ID)
    }
}

fn parse_key(data: &BTreeMap<String, String>, key: &str, default: u32) -> Result<u32, AllocatorError> {
    let Some(raw) = data.get(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<u32>()
        .map_err(|e| AllocatorError::InvalidConfigValue {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_keys_missing() {
        let config = AllocatorConfig::from_data(&BTreeMap::new()).unwrap();
        assert_eq!(config, AllocatorConfig::default());
        assert_eq!(config.max_id, 1000);
        assert_eq!(config.initial_port, 8100);
    }

    #[test]
    fn test_reads_both_keys() {
        let config = AllocatorConfig::from_data(&data(&[("max-id", "20"), ("initial-port", "9000")])).unwrap();
        assert_eq!(config.max_id, 20);
        assert_eq!(config.initial_port, 9000);
    }

    #[test]
    fn test_trims_whitespace() {
        let config = AllocatorConfig::from_data(&data(&[("max-id", " 4\n")])).unwrap();
        assert_eq!(config.max_id, 4);
        assert_eq!(config.initial_port, DEFAULT_INITIAL_PORT);
    }

    #[test]
    fn test_rejects_non_integer() {
        let err = AllocatorConfig::from_data(&data(&[("max-id", "lots")])).unwrap_err();
        match err {
            AllocatorError::InvalidConfigValue { key, value, .. } => {
                assert_eq!(key, "max-id");
                assert_eq!(value, "lots");
            }
        }
    }

    #[test]
    fn test_rejects_negative() {
        assert!(AllocatorConfig::from_data(&data(&[("initial-port", "-1")])).is_err());
    }

    #[test]
    fn test_max_id_ignores_bad_initial_port() {
        let values = data(&[("max-id", "4"), ("initial-port", "oops")]);
        assert_eq!(AllocatorConfig::max_id_from_data(&values).unwrap(), 4);
        assert!(AllocatorConfig::from_data(&values).is_err());
    }
}
