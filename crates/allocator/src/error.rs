//! Allocator errors

use thiserror::Error;

/// Errors raised while reading allocator settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocatorError {
    /// A ConfigMap value could not be parsed as a non-negative integer
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidConfigValue {
        /// ConfigMap key
        key: String,
        /// Raw value found under the key
        value: String,
        /// Parser message
        reason: String,
    },
}
