//! # Ops Orders Services
//!
//! Concrete order services for the built-in order types, wired to the coordination layer.
//!
//! - [`LifecycleOrderService`](order_service::LifecycleOrderService): the
//!   [`OrderService`](opsorder_core::service::OrderService) implementation for every payload shape
//! - [`notifications`]: change notifications over pub/sub
//! - [`bootstrap`]: builds the services and a frozen [`OrderRegistry`](opsorder_core::registry::OrderRegistry)
//! - [`config`]: environment-driven settings
//!
//! ## Example
//!
//! ```ignore
//! let context = ServiceContext::new(store, device_source, Arc::new(SystemClock), ServiceConfig::from_env());
//! let registry = build_registry(&context, repositories)?;
//!
//! let maintenance = registry.dispatch("maintenance")?;
//! let order = maintenance.create_order(payload.into_any(), "alice").await?;
//! maintenance.process(order.id, "ops-bot", None).await?;
//! ```

pub mod bootstrap;
pub mod config;
pub mod notifications;
pub mod order_service;

pub use bootstrap::{OrderRepositories, ServiceContext, build_registry};
pub use config::ServiceConfig;
pub use notifications::{NotificationListener, OrderNotification, OrderNotifier};
pub use order_service::{
    ElasticScalingOrderService, GeneralOrderService, LifecycleOrderService, MaintenanceOrderService,
};
