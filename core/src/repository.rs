//! Persistence boundary for orders.
//!
//! The core never decides how orders are stored. Concrete storage (a relational database,
//! a document store, the in-memory repository in `opsorder-testing`) implements
//! [`OrderRepository`] and is injected into the order services.

use crate::service::{ListFilter, OrderPage, ServiceFuture};
use crate::types::{NewOrder, Order, OrderId};

/// Storage for orders of one payload shape.
///
/// # Implementation Notes
///
/// - `insert` assigns a fresh, never reused identifier
/// - `save` overwrites the stored order wholesale; callers hold the order lock
/// - orders are never deleted through this trait
pub trait OrderRepository<P>: Send + Sync {
    /// Persist a new order and return it with its identifier.
    ///
    /// # Errors
    ///
    /// Returns an internal failure if the write fails.
    fn insert(&self, order: NewOrder<P>) -> ServiceFuture<'_, Order<P>>;

    /// Load an order, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an internal failure if the read fails.
    fn get(&self, id: OrderId) -> ServiceFuture<'_, Option<Order<P>>>;

    /// Load one page of orders matching `filter`, ordered by ascending id.
    ///
    /// `filter.limit` is already resolved by the caller.
    ///
    /// # Errors
    ///
    /// Returns an internal failure if the read fails.
    fn list(&self, filter: ListFilter) -> ServiceFuture<'_, OrderPage<P>>;

    /// Overwrite a stored order after a transition.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the order vanished, or an internal failure.
    fn save(&self, order: Order<P>) -> ServiceFuture<'_, ()>;
}
