//! Core domain types shared by every order type.
//!
//! An [`Order`] is generic over its payload so each order type keeps its own
//! data shape while sharing identity, status, and execution history.

use crate::error::OrderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric order identifier assigned by the persistence layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Creates a new `OrderId`
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the inner numeric value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Tag selecting which implementation and payload shape govern an order.
///
/// The three built-in tags are provided as constants. Further tags are introduced by
/// registering an implementation under them, not by extending this type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderType(String);

impl OrderType {
    /// General operational requests
    pub const GENERAL: &'static str = "general";
    /// Elastic scaling requests
    pub const ELASTIC_SCALING: &'static str = "elastic-scaling";
    /// Device maintenance requests
    pub const MAINTENANCE: &'static str = "maintenance";

    /// Creates a new tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The `general` tag
    #[must_use]
    pub fn general() -> Self {
        Self::new(Self::GENERAL)
    }

    /// The `elastic-scaling` tag
    #[must_use]
    pub fn elastic_scaling() -> Self {
        Self::new(Self::ELASTIC_SCALING)
    }

    /// The `maintenance` tag
    #[must_use]
    pub fn maintenance() -> Self {
        Self::new(Self::MAINTENANCE)
    }

    /// Returns the tag as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Status of an order in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, waiting for an executor to pick it up
    Pending,
    /// Being worked on
    Processing,
    /// Finished successfully (terminal)
    Completed,
    /// Finished unsuccessfully (terminal)
    Failed,
    /// Withdrawn before completion (terminal)
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Terminal statuses accept no further lifecycle operations.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::validation(format!("unknown order status '{s}'")))
    }
}

/// One accepted status transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Status before the transition
    pub from: OrderStatus,
    /// Status after the transition
    pub to: OrderStatus,
    /// Who performed the transition
    pub actor: String,
    /// Optional free-form reason (mandatory for failures)
    pub reason: Option<String>,
    /// When the transition was applied
    pub at: DateTime<Utc>,
}

/// Data needed to persist a brand new order.
///
/// The persistence layer assigns the identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrder<P> {
    /// Order type tag the order was created under
    pub order_type: OrderType,
    /// Type-specific payload
    pub payload: P,
    /// Identity of the requester
    pub created_by: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl<P> NewOrder<P> {
    /// Materialize the order in `pending` with the assigned identifier.
    #[must_use]
    pub fn into_order(self, id: OrderId) -> Order<P> {
        Order {
            id,
            order_type: self.order_type,
            status: OrderStatus::Pending,
            payload: self.payload,
            created_by: self.created_by,
            executor: None,
            reason: None,
            created_at: self.created_at,
            updated_at: self.created_at,
            history: Vec::new(),
        }
    }
}

/// A tracked request moving through the order lifecycle.
///
/// Status, executor, reason and history are only changed by
/// [`LifecycleStateMachine`](crate::lifecycle::LifecycleStateMachine), which keeps the
/// history append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order<P> {
    /// Identifier assigned at creation
    pub id: OrderId,
    /// Tag the order was created under
    pub order_type: OrderType,
    status: OrderStatus,
    /// Type-specific payload
    pub payload: P,
    /// Identity of the requester
    pub created_by: String,
    executor: Option<String>,
    reason: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    history: Vec<HistoryEntry>,
}

impl<P> Order<P> {
    /// Current status
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Executor of the last transition
    #[must_use]
    pub fn executor(&self) -> Option<&str> {
        self.executor.as_deref()
    }

    /// Reason given with the last transition
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Time of the last change
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Execution history, oldest first
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Most recent history entry
    #[must_use]
    pub fn last_transition(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Apply an already-validated transition.
    pub(crate) fn record_transition(&mut self, entry: HistoryEntry) {
        self.status = entry.to;
        self.executor = Some(entry.actor.clone());
        self.reason.clone_from(&entry.reason);
        self.updated_at = entry.at;
        self.history.push(entry);
    }

    /// Swap the payload for another shape, keeping lifecycle data intact.
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Order<Q> {
        Order {
            id: self.id,
            order_type: self.order_type,
            status: self.status,
            payload: f(self.payload),
            created_by: self.created_by,
            executor: self.executor,
            reason: self.reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            history: self.history,
        }
    }
}
