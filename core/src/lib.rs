//! # Ops Orders Core
//!
//! Order types, lifecycle state machine, service contract and type registry.
//!
//! Orders are long-running requests against infrastructure (general operational work,
//! elastic scaling, device maintenance). Every order type has its own payload shape and
//! shares one lifecycle:
//!
//! - **Types**: [`Order`](types::Order), [`OrderStatus`](types::OrderStatus), execution history
//! - **Payloads**: the closed set of shapes in [`payload`], joined by [`AnyPayload`](payload::AnyPayload)
//! - **Lifecycle**: [`LifecycleStateMachine`](lifecycle::LifecycleStateMachine) enforces the transition table
//! - **Contract**: [`OrderService`](service::OrderService), the operation set every type exposes
//! - **Registry**: [`OrderRegistry`](registry::OrderRegistry) maps tags to implementations
//! - **Persistence boundary**: [`OrderRepository`](repository::OrderRepository)
//!
//! ## Example
//!
//! ```ignore
//! use opsorder_core::prelude::*;
//!
//! let service = registry.resolve_as::<MaintenancePayload>("maintenance")?;
//! let order = service.create_order(CreateOrderRequest::new(payload, "alice")).await?;
//! service.process(order.id, "ops-bot", None).await?;
//! service.fail(order.id, "ops-bot", "device unreachable").await?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod error;
pub mod lifecycle;
pub mod payload;
pub mod registry;
pub mod repository;
pub mod service;
pub mod types;

/// Environment module - Dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic history timestamps
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Convenience re-exports for order service implementations and callers.
pub mod prelude {
    pub use crate::environment::{Clock, SystemClock};
    pub use crate::error::{OrderError, Result};
    pub use crate::lifecycle::{LifecycleStateMachine, TransitionRequest};
    pub use crate::payload::{
        AnyPayload, ElasticScalingPayload, GeneralPayload, MaintenanceKind, MaintenancePayload,
        OrderPayload, PayloadKind, ScalingDirection,
    };
    pub use crate::registry::{OrderRegistry, RegisteredService};
    pub use crate::repository::OrderRepository;
    pub use crate::service::{
        CreateOrderRequest, ListFilter, OrderPage, OrderService, ServiceFuture,
    };
    pub use crate::types::{HistoryEntry, NewOrder, Order, OrderId, OrderStatus, OrderType};
}
