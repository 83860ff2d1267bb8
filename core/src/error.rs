//! Error taxonomy for order dispatch, lifecycle and coordination failures.

use crate::types::{OrderId, OrderStatus};
use thiserror::Error;

/// Result type alias for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors reported by the order core to the transport layer.
///
/// Variants are grouped by where they originate:
/// - dispatch (registry and contract checks) never reach the state machine
/// - lifecycle errors are reported without side effects
/// - coordination and persistence failures are passed through verbatim, never retried here
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    // ═══════════════════════════════════════════════════════════
    // Dispatch Errors
    // ═══════════════════════════════════════════════════════════

    /// The order-type tag has no registered implementation.
    #[error("Invalid order type: {order_type}")]
    InvalidOrderType {
        /// Tag supplied by the caller
        order_type: String,
    },

    /// The implementation does not serve the payload shape the caller expects, or was
    /// built for a different tag than the one it is being bound under.
    #[error("Service for order type '{order_type}' serves {actual} orders, not {expected}")]
    ServiceContractMismatch {
        /// Tag that was resolved or bound
        order_type: String,
        /// Payload kind (or tag) the caller asked for
        expected: String,
        /// Payload kind (or tag) the implementation serves
        actual: String,
    },

    /// A second implementation was registered for a tag that is already bound.
    #[error("Order type '{order_type}' is already registered")]
    DuplicateRegistration {
        /// Tag that was already bound
        order_type: String,
    },

    /// Registration was attempted after the registry was frozen.
    #[error("Order type registry is frozen")]
    RegistryFrozen,

    // ═══════════════════════════════════════════════════════════
    // Lifecycle Errors
    // ═══════════════════════════════════════════════════════════

    /// No order exists with the given identifier.
    #[error("Order {order_id} not found")]
    RecordNotFound {
        /// Identifier that was looked up
        order_id: OrderId,
    },

    /// The requested status change is not permitted from the current status.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status of the order
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// The request is malformed (missing reason, empty executor, bad payload).
    #[error("Validation error: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // Coordination Errors
    // ═══════════════════════════════════════════════════════════

    /// Another worker holds the lock for this order or device.
    #[error("Operation already in progress (lock held: {key})")]
    LockContention {
        /// Lock key that was contended
        key: String,
    },

    /// Persistence or coordination store failure.
    #[error("Internal failure: {0}")]
    InternalFailure(String),
}

impl OrderError {
    /// Build a validation error from anything displayable.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build an internal failure from anything displayable.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFailure(message.into())
    }

    /// Returns `true` if the error was caused by the request rather than the system.
    ///
    /// # Examples
    ///
    /// ```
    /// # use opsorder_core::error::OrderError;
    /// assert!(OrderError::validation("reason is required").is_client_error());
    /// assert!(!OrderError::internal("connection reset").is_client_error());
    /// ```
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOrderType { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidTransition { .. }
                | Self::Validation(_)
        )
    }

    /// Returns `true` if the caller may back off and retry the same request.
    ///
    /// Only lock contention qualifies. Internal failures are reported verbatim and
    /// retrying them is a caller decision.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockContention { .. })
    }

    /// Stable machine-readable code for the transport layer.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOrderType { .. } => "invalid_order_type",
            Self::ServiceContractMismatch { .. } => "service_contract_mismatch",
            Self::DuplicateRegistration { .. } => "duplicate_registration",
            Self::RegistryFrozen => "registry_frozen",
            Self::RecordNotFound { .. } => "record_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation_error",
            Self::LockContention { .. } => "lock_contention",
            Self::InternalFailure(_) => "internal_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_is_the_only_retryable_error() {
        assert!(OrderError::LockContention { key: "k".into() }.is_retryable());
        assert!(!OrderError::internal("boom").is_retryable());
        assert!(
            !OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed,
            }
            .is_retryable()
        );
    }

    #[test]
    fn contract_mismatch_is_not_a_client_error() {
        let err = OrderError::ServiceContractMismatch {
            order_type: "general".into(),
            expected: "maintenance".into(),
            actual: "general".into(),
        };
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "service_contract_mismatch");
    }

    #[test]
    fn display_includes_statuses() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Completed,
        };
        assert_eq!(err.to_string(), "Invalid transition from pending to completed");
    }
}
