//! Errors from the coordination store, locks and device cache.

use opsorder_core::error::OrderError;
use thiserror::Error;

/// Result type alias for coordination operations.
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Failures talking to the coordination store or the device system of record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Could not reach the backing store
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A store command failed
    #[error("{operation} failed for '{key}': {reason}")]
    CommandFailed {
        /// Command name (GET, SET, SCAN, ...)
        operation: &'static str,
        /// Key or channel the command addressed
        key: String,
        /// Backend error message
        reason: String,
    },

    /// Subscribing to a channel failed
    #[error("Subscription failed for channel '{channel}': {reason}")]
    SubscriptionFailed {
        /// Channel name
        channel: String,
        /// Backend error message
        reason: String,
    },

    /// A cached value could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The device system of record failed
    #[error("Device source error: {0}")]
    Source(String),
}

impl CoordinationError {
    /// Build a [`CoordinationError::CommandFailed`] from any displayable backend error.
    pub fn command(operation: &'static str, key: &str, err: impl std::fmt::Display) -> Self {
        Self::CommandFailed {
            operation,
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoordinationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<CoordinationError> for OrderError {
    fn from(err: CoordinationError) -> Self {
        Self::InternalFailure(err.to_string())
    }
}
