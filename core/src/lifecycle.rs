//! Order lifecycle state machine.
//!
//! ```text
//! pending ──► processing ──► completed
//!    │            │
//!    │            ├────────► failed
//!    │            │
//!    └────────────┴────────► cancelled
//! ```
//!
//! Every transition is checked against the table in [`allowed_transitions`]. There are no
//! self-transitions, so asking for the current status is rejected like any other unlisted
//! pair. A rejected request leaves status and history untouched.

use crate::error::{OrderError, Result};
use crate::types::{HistoryEntry, Order, OrderStatus};
use chrono::{DateTime, Utc};

/// Statuses reachable from `from` in one step.
#[must_use]
pub const fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
        OrderStatus::Processing => &[
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ],
        OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled => &[],
    }
}

/// Whether `from → to` appears in the transition table.
#[must_use]
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// A requested status change with its bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Requested status
    pub target: OrderStatus,
    /// Identity performing the transition
    pub executor: String,
    /// Optional reason, mandatory when `target` is `failed`
    pub reason: Option<String>,
}

impl TransitionRequest {
    /// Creates a new transition request
    #[must_use]
    pub fn new(target: OrderStatus, executor: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            target,
            executor: executor.into(),
            reason,
        }
    }

    /// Reason with surrounding whitespace removed, `None` when blank.
    fn normalized_reason(&self) -> Option<String> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }
}

/// Enforces legal transitions and records execution history.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleStateMachine;

impl LifecycleStateMachine {
    /// Check a request against the current status without touching anything.
    ///
    /// The transition table is consulted first, so an unlisted pair reports
    /// `InvalidTransition` even when the request is also malformed.
    ///
    /// # Errors
    ///
    /// - [`OrderError::InvalidTransition`] if the pair is not in the table
    /// - [`OrderError::Validation`] if the executor is blank, or a failure has no reason
    pub fn validate(current: OrderStatus, request: &TransitionRequest) -> Result<()> {
        if !can_transition(current, request.target) {
            metrics::counter!("opsorder.transition.rejected").increment(1);
            return Err(OrderError::InvalidTransition {
                from: current,
                to: request.target,
            });
        }

        if request.executor.trim().is_empty() {
            return Err(OrderError::validation("executor is required"));
        }

        if request.target == OrderStatus::Failed && request.normalized_reason().is_none() {
            return Err(OrderError::validation(
                "a reason is required when failing an order",
            ));
        }

        Ok(())
    }

    /// Validate and apply a transition, appending exactly one history entry.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate). On error the order is unchanged.
    pub fn apply<P>(
        order: &mut Order<P>,
        request: TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        let from = order.status();
        Self::validate(from, &request)?;

        let entry = HistoryEntry {
            from,
            to: request.target,
            actor: request.executor.trim().to_string(),
            reason: request.normalized_reason(),
            at: now,
        };
        order.record_transition(entry.clone());

        metrics::counter!("opsorder.transition.accepted").increment(1);
        tracing::info!(
            order_id = %order.id,
            order_type = %order.order_type,
            from = %entry.from,
            to = %entry.to,
            executor = %entry.actor,
            "Order transition applied"
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::{NewOrder, OrderId, OrderType};
    use proptest::prelude::*;

    fn order_in(status: OrderStatus) -> Order<()> {
        let now = Utc::now();
        let mut order = NewOrder {
            order_type: OrderType::general(),
            payload: (),
            created_by: "alice".into(),
            created_at: now,
        }
        .into_order(OrderId::new(1));

        let path: &[OrderStatus] = match status {
            OrderStatus::Pending => &[],
            OrderStatus::Processing => &[OrderStatus::Processing],
            OrderStatus::Completed => &[OrderStatus::Processing, OrderStatus::Completed],
            OrderStatus::Failed => &[OrderStatus::Processing, OrderStatus::Failed],
            OrderStatus::Cancelled => &[OrderStatus::Cancelled],
        };
        for target in path {
            let request = TransitionRequest::new(*target, "setup", Some("setup".into()));
            LifecycleStateMachine::apply(&mut order, request, now).unwrap();
        }
        order
    }

    fn status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let mut order = order_in(OrderStatus::Pending);
        let request = TransitionRequest::new(OrderStatus::Completed, "bob", None);

        let err = LifecycleStateMachine::apply(&mut order, request, Utc::now()).unwrap_err();

        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed,
            }
        );
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.history().is_empty());
    }

    #[test]
    fn processing_fails_with_reason() {
        let mut order = order_in(OrderStatus::Processing);
        let now = Utc::now();
        let request = TransitionRequest::new(OrderStatus::Failed, "bob", Some("timeout".into()));

        LifecycleStateMachine::apply(&mut order, request, now).unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(
            order.last_transition().unwrap(),
            &HistoryEntry {
                from: OrderStatus::Processing,
                to: OrderStatus::Failed,
                actor: "bob".into(),
                reason: Some("timeout".into()),
                at: now,
            }
        );
        assert_eq!(order.executor(), Some("bob"));
        assert_eq!(order.reason(), Some("timeout"));
    }

    #[test]
    fn failing_without_reason_is_a_validation_error() {
        for reason in [None, Some(String::new()), Some("   ".to_string())] {
            let mut order = order_in(OrderStatus::Processing);
            let request = TransitionRequest::new(OrderStatus::Failed, "bob", reason);

            let err = LifecycleStateMachine::apply(&mut order, request, Utc::now()).unwrap_err();

            assert!(matches!(err, OrderError::Validation(_)));
            assert_eq!(order.status(), OrderStatus::Processing);
            assert_eq!(order.history().len(), 1);
        }
    }

    #[test]
    fn blank_executor_is_rejected() {
        let mut order = order_in(OrderStatus::Pending);
        let request = TransitionRequest::new(OrderStatus::Processing, "  ", None);

        let err = LifecycleStateMachine::apply(&mut order, request, Utc::now()).unwrap_err();

        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[test]
    fn non_failure_transitions_accept_empty_reason() {
        let mut order = order_in(OrderStatus::Pending);
        let request = TransitionRequest::new(OrderStatus::Processing, "bob", Some(String::new()));

        let entry = LifecycleStateMachine::apply(&mut order, request, Utc::now()).unwrap();

        assert_eq!(entry.reason, None);
    }

    proptest! {
        #[test]
        fn transition_accepted_iff_listed(from in status_strategy(), to in status_strategy()) {
            let mut order = order_in(from);
            let history_before = order.history().len();
            let request = TransitionRequest::new(to, "prop", Some("because".into()));

            let result = LifecycleStateMachine::apply(&mut order, request, Utc::now());

            if can_transition(from, to) {
                let entry = result.unwrap();
                prop_assert_eq!(entry.from, from);
                prop_assert_eq!(entry.to, to);
                prop_assert_eq!(order.status(), to);
                prop_assert_eq!(order.history().len(), history_before + 1);
            } else {
                prop_assert_eq!(
                    result.unwrap_err(),
                    OrderError::InvalidTransition { from, to }
                );
                prop_assert_eq!(order.status(), from);
                prop_assert_eq!(order.history().len(), history_before);
            }
        }

        #[test]
        fn same_status_is_never_allowed(status in status_strategy()) {
            prop_assert!(!can_transition(status, status));
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for status in OrderStatus::ALL {
            assert_eq!(allowed_transitions(status).is_empty(), status.is_terminal());
        }
    }
}
