//! The unified order service contract.
//!
//! Every order type exposes the same operation set through [`OrderService`]; callers
//! resolve an implementation through the [`OrderRegistry`](crate::registry::OrderRegistry)
//! and never depend on the concrete type behind it.
//!
//! # Dyn Compatibility
//!
//! Methods return [`ServiceFuture`] (an explicitly boxed future) instead of using
//! `async fn`, so implementations can be stored as `Arc<dyn OrderService<Payload = P>>`.

use crate::error::Result;
use crate::lifecycle::TransitionRequest;
use crate::payload::OrderPayload;
use crate::types::{Order, OrderId, OrderStatus, OrderType};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by service and repository operations.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Input for [`OrderService::create_order`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest<P> {
    /// Type-specific payload
    pub payload: P,
    /// Identity of the requester
    pub created_by: String,
}

impl<P> CreateOrderRequest<P> {
    /// Creates a new request
    #[must_use]
    pub fn new(payload: P, created_by: impl Into<String>) -> Self {
        Self {
            payload,
            created_by: created_by.into(),
        }
    }
}

/// Filter for [`OrderService::list_orders`].
///
/// Results are ordered by ascending id. `limit` falls back to the service's default
/// page size and is capped at its maximum.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Only orders in this status
    pub status: Option<OrderStatus>,
    /// Only orders created by this identity
    pub created_by: Option<String>,
    /// Number of matching orders to skip
    #[serde(default)]
    pub offset: usize,
    /// Page size
    pub limit: Option<usize>,
}

impl ListFilter {
    /// Filter by status
    #[must_use]
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by creator
    #[must_use]
    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Set offset and limit
    #[must_use]
    pub const fn paged(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Resolve the page size against defaults; a zero limit is treated as unset.
    #[must_use]
    pub fn normalized(mut self, default_limit: usize, max_limit: usize) -> Self {
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(max_limit);
        self.limit = Some(limit);
        self
    }

    /// Whether an order passes the status and creator criteria.
    #[must_use]
    pub fn matches<P>(&self, order: &Order<P>) -> bool {
        self.status.is_none_or(|s| s == order.status())
            && self
                .created_by
                .as_deref()
                .is_none_or(|c| c == order.created_by)
    }
}

/// One page of orders plus the number of matches before paging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderPage<P> {
    /// Orders on this page
    pub orders: Vec<Order<P>>,
    /// Total number of matching orders
    pub total: usize,
}

/// Uniform operation set exposed by every order-type implementation.
pub trait OrderService: Send + Sync {
    /// Payload shape this service manages
    type Payload: OrderPayload;

    /// Tag this service was built for
    fn order_type(&self) -> &OrderType;

    /// Validate the payload and persist a new order in `pending`.
    ///
    /// # Errors
    ///
    /// - [`OrderError::Validation`](crate::error::OrderError::Validation) for malformed payloads
    /// - [`OrderError::InternalFailure`](crate::error::OrderError::InternalFailure) on persistence failure
    fn create_order(
        &self,
        request: CreateOrderRequest<Self::Payload>,
    ) -> ServiceFuture<'_, Order<Self::Payload>>;

    /// Load one order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::RecordNotFound`](crate::error::OrderError::RecordNotFound)
    /// if no order has this id.
    fn get_order(&self, id: OrderId) -> ServiceFuture<'_, Order<Self::Payload>>;

    /// List orders matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an internal failure if the persistence layer fails.
    fn list_orders(&self, filter: ListFilter) -> ServiceFuture<'_, OrderPage<Self::Payload>>;

    /// Move an order to a new status through the lifecycle state machine.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound` if the order does not exist
    /// - `InvalidTransition` / `Validation` from the state machine
    /// - `LockContention` if another worker is mutating the same order
    /// - `InternalFailure` on store failures
    fn update_order_status(
        &self,
        id: OrderId,
        request: TransitionRequest,
    ) -> ServiceFuture<'_, Order<Self::Payload>>;

    /// Move to `processing`.
    ///
    /// # Errors
    ///
    /// See [`update_order_status`](Self::update_order_status).
    fn process(
        &self,
        id: OrderId,
        executor: &str,
        reason: Option<String>,
    ) -> ServiceFuture<'_, Order<Self::Payload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Processing, executor, reason),
        )
    }

    /// Move to `completed`.
    ///
    /// # Errors
    ///
    /// See [`update_order_status`](Self::update_order_status).
    fn complete(
        &self,
        id: OrderId,
        executor: &str,
        reason: Option<String>,
    ) -> ServiceFuture<'_, Order<Self::Payload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Completed, executor, reason),
        )
    }

    /// Move to `failed`; the reason is mandatory.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank reason, otherwise see
    /// [`update_order_status`](Self::update_order_status).
    fn fail(
        &self,
        id: OrderId,
        executor: &str,
        reason: &str,
    ) -> ServiceFuture<'_, Order<Self::Payload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Failed, executor, Some(reason.to_string())),
        )
    }

    /// Move to `cancelled`.
    ///
    /// # Errors
    ///
    /// See [`update_order_status`](Self::update_order_status).
    fn cancel(
        &self,
        id: OrderId,
        executor: &str,
        reason: Option<String>,
    ) -> ServiceFuture<'_, Order<Self::Payload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Cancelled, executor, reason),
        )
    }
}
