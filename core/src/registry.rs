//! Order type registry.
//!
//! Binds order-type tags to service implementations. The registry is filled once at
//! startup and read by every request afterwards:
//!
//! - [`OrderRegistry::register`] rejects a tag that is already bound
//! - [`OrderRegistry::replace`] overwrites explicitly and hands back the old binding
//! - [`OrderRegistry::freeze`] turns any later registration into an error
//!
//! Reads take a shared lock and clone an `Arc`, so lookups never wait on each other.
//!
//! ## Example
//!
//! ```ignore
//! let registry = OrderRegistry::new();
//! registry.register(OrderType::general(), RegisteredService::new(general_service))?;
//! registry.freeze();
//!
//! // Typed access, with the capability check
//! let service = registry.resolve_as::<GeneralPayload>("general")?;
//! let order = service.get_order(OrderId::new(42)).await?;
//!
//! // Tag-only access
//! registry.dispatch("general")?.process(OrderId::new(42), "alice", None).await?;
//! ```

use crate::error::{OrderError, Result};
use crate::lifecycle::TransitionRequest;
use crate::payload::{
    AnyPayload, ElasticScalingPayload, GeneralPayload, MaintenancePayload, OrderPayload,
    PayloadKind,
};
use crate::service::{CreateOrderRequest, ListFilter, OrderPage, OrderService};
use crate::types::{Order, OrderId, OrderStatus, OrderType};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A service bound to the contract for one payload shape.
#[derive(Clone)]
pub enum RegisteredService {
    /// Service for [`GeneralPayload`] orders
    General(Arc<dyn OrderService<Payload = GeneralPayload>>),
    /// Service for [`ElasticScalingPayload`] orders
    ElasticScaling(Arc<dyn OrderService<Payload = ElasticScalingPayload>>),
    /// Service for [`MaintenancePayload`] orders
    Maintenance(Arc<dyn OrderService<Payload = MaintenancePayload>>),
}

impl fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredService")
            .field("kind", &self.kind())
            .field("order_type", self.order_type())
            .finish()
    }
}

// Runs `$call` against whichever service is bound and erases the payload type of the
// resulting order.
macro_rules! dispatch_erased {
    ($registered:expr, $service:ident => $call:expr) => {
        match $registered {
            RegisteredService::General($service) => $call.await.map(erase_order),
            RegisteredService::ElasticScaling($service) => $call.await.map(erase_order),
            RegisteredService::Maintenance($service) => $call.await.map(erase_order),
        }
    };
}

fn erase_order<P: OrderPayload>(order: Order<P>) -> Order<AnyPayload> {
    order.map_payload(OrderPayload::into_any)
}

fn erase_page<P: OrderPayload>(page: OrderPage<P>) -> OrderPage<AnyPayload> {
    OrderPage {
        orders: page.orders.into_iter().map(erase_order).collect(),
        total: page.total,
    }
}

impl RegisteredService {
    /// Wrap a concrete service into the variant matching its payload shape.
    #[must_use]
    pub fn new<S>(service: Arc<S>) -> Self
    where
        S: OrderService + 'static,
    {
        <S::Payload as OrderPayload>::wrap_service(service)
    }

    /// Payload shape served
    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::General(_) => PayloadKind::General,
            Self::ElasticScaling(_) => PayloadKind::ElasticScaling,
            Self::Maintenance(_) => PayloadKind::Maintenance,
        }
    }

    /// Tag the bound service reports
    #[must_use]
    pub fn order_type(&self) -> &OrderType {
        match self {
            Self::General(s) => s.order_type(),
            Self::ElasticScaling(s) => s.order_type(),
            Self::Maintenance(s) => s.order_type(),
        }
    }

    /// Capability check: the bound service as a contract over payload `P`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::ServiceContractMismatch`] if the service serves another shape.
    pub fn as_typed<P: OrderPayload>(&self) -> Result<Arc<dyn OrderService<Payload = P>>> {
        P::bound_service(self).ok_or_else(|| OrderError::ServiceContractMismatch {
            order_type: self.order_type().to_string(),
            expected: P::KIND.to_string(),
            actual: self.kind().to_string(),
        })
    }

    /// Create an order from a tagged payload.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::ServiceContractMismatch`] if the payload variant does not
    /// match the bound service, otherwise whatever the service reports.
    pub async fn create_order(
        &self,
        payload: AnyPayload,
        created_by: &str,
    ) -> Result<Order<AnyPayload>> {
        match (self, payload) {
            (Self::General(s), AnyPayload::General(p)) => s
                .create_order(CreateOrderRequest::new(p, created_by))
                .await
                .map(erase_order),
            (Self::ElasticScaling(s), AnyPayload::ElasticScaling(p)) => s
                .create_order(CreateOrderRequest::new(p, created_by))
                .await
                .map(erase_order),
            (Self::Maintenance(s), AnyPayload::Maintenance(p)) => s
                .create_order(CreateOrderRequest::new(p, created_by))
                .await
                .map(erase_order),
            (service, payload) => Err(OrderError::ServiceContractMismatch {
                order_type: service.order_type().to_string(),
                expected: payload.kind().to_string(),
                actual: service.kind().to_string(),
            }),
        }
    }

    /// Load one order with its payload erased.
    ///
    /// # Errors
    ///
    /// See [`OrderService::get_order`].
    pub async fn get_order(&self, id: OrderId) -> Result<Order<AnyPayload>> {
        dispatch_erased!(self, s => s.get_order(id))
    }

    /// List orders with payloads erased.
    ///
    /// # Errors
    ///
    /// See [`OrderService::list_orders`].
    pub async fn list_orders(&self, filter: ListFilter) -> Result<OrderPage<AnyPayload>> {
        match self {
            Self::General(s) => s.list_orders(filter).await.map(erase_page),
            Self::ElasticScaling(s) => s.list_orders(filter).await.map(erase_page),
            Self::Maintenance(s) => s.list_orders(filter).await.map(erase_page),
        }
    }

    /// Apply a status transition.
    ///
    /// # Errors
    ///
    /// See [`OrderService::update_order_status`].
    pub async fn update_order_status(
        &self,
        id: OrderId,
        request: TransitionRequest,
    ) -> Result<Order<AnyPayload>> {
        dispatch_erased!(self, s => s.update_order_status(id, request))
    }

    /// Move to `processing`.
    ///
    /// # Errors
    ///
    /// See [`OrderService::update_order_status`].
    pub async fn process(
        &self,
        id: OrderId,
        executor: &str,
        reason: Option<String>,
    ) -> Result<Order<AnyPayload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Processing, executor, reason),
        )
        .await
    }

    /// Move to `completed`.
    ///
    /// # Errors
    ///
    /// See [`OrderService::update_order_status`].
    pub async fn complete(
        &self,
        id: OrderId,
        executor: &str,
        reason: Option<String>,
    ) -> Result<Order<AnyPayload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Completed, executor, reason),
        )
        .await
    }

    /// Move to `failed` with a mandatory reason.
    ///
    /// # Errors
    ///
    /// See [`OrderService::update_order_status`].
    pub async fn fail(&self, id: OrderId, executor: &str, reason: &str) -> Result<Order<AnyPayload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Failed, executor, Some(reason.to_string())),
        )
        .await
    }

    /// Move to `cancelled`.
    ///
    /// # Errors
    ///
    /// See [`OrderService::update_order_status`].
    pub async fn cancel(
        &self,
        id: OrderId,
        executor: &str,
        reason: Option<String>,
    ) -> Result<Order<AnyPayload>> {
        self.update_order_status(
            id,
            TransitionRequest::new(OrderStatus::Cancelled, executor, reason),
        )
        .await
    }
}

#[derive(Default)]
struct RegistryInner {
    services: HashMap<OrderType, RegisteredService>,
    frozen: bool,
}

/// A service stamps its own tag on orders and lock keys, so it may only be bound under it.
fn check_binding(order_type: &OrderType, service: &RegisteredService) -> Result<()> {
    if service.order_type() == order_type {
        return Ok(());
    }
    tracing::warn!(
        order_type = %order_type,
        service_order_type = %service.order_type(),
        "Rejected registration of a service built for another order type"
    );
    Err(OrderError::ServiceContractMismatch {
        order_type: order_type.to_string(),
        expected: order_type.to_string(),
        actual: service.order_type().to_string(),
    })
}

/// Thread-safe registry of order-type implementations.
///
/// Cloning is cheap and every clone shares the same bindings.
#[derive(Clone, Default)]
pub struct OrderRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl fmt::Debug for OrderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderRegistry")
            .field("order_types", &self.order_types())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl OrderRegistry {
    /// Create an empty, unfrozen registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Writers only insert or flip a flag, so a poisoned lock still holds a consistent map.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `service` to `order_type`.
    ///
    /// # Errors
    ///
    /// - [`OrderError::DuplicateRegistration`] if the tag is already bound
    /// - [`OrderError::ServiceContractMismatch`] if the service was built for another tag
    /// - [`OrderError::RegistryFrozen`] after [`freeze`](Self::freeze)
    pub fn register(&self, order_type: OrderType, service: RegisteredService) -> Result<()> {
        let mut inner = self.write();
        if inner.frozen {
            return Err(OrderError::RegistryFrozen);
        }
        check_binding(&order_type, &service)?;
        if inner.services.contains_key(&order_type) {
            tracing::warn!(order_type = %order_type, "Rejected duplicate order type registration");
            return Err(OrderError::DuplicateRegistration {
                order_type: order_type.to_string(),
            });
        }

        tracing::info!(order_type = %order_type, kind = %service.kind(), "Registered order type");
        inner.services.insert(order_type, service);
        Ok(())
    }

    /// Bind `service` to `order_type`, returning the binding it displaced.
    ///
    /// # Errors
    ///
    /// - [`OrderError::ServiceContractMismatch`] if the service was built for another tag
    /// - [`OrderError::RegistryFrozen`] after [`freeze`](Self::freeze)
    pub fn replace(
        &self,
        order_type: OrderType,
        service: RegisteredService,
    ) -> Result<Option<RegisteredService>> {
        let mut inner = self.write();
        if inner.frozen {
            return Err(OrderError::RegistryFrozen);
        }
        check_binding(&order_type, &service)?;

        tracing::info!(order_type = %order_type, kind = %service.kind(), "Replaced order type registration");
        Ok(inner.services.insert(order_type, service))
    }

    /// Reject all further registration.
    pub fn freeze(&self) {
        self.write().frozen = true;
    }

    /// Whether [`freeze`](Self::freeze) has been called
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.read().frozen
    }

    /// Look up a binding; `None` means the tag is not registered.
    #[must_use]
    pub fn resolve(&self, order_type: &str) -> Option<RegisteredService> {
        self.read()
            .services
            .get(&OrderType::new(order_type))
            .cloned()
    }

    /// Look up a binding, reporting an unknown tag as a request error.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidOrderType`] if the tag is not registered.
    pub fn dispatch(&self, order_type: &str) -> Result<RegisteredService> {
        self.resolve(order_type)
            .ok_or_else(|| OrderError::InvalidOrderType {
                order_type: order_type.to_string(),
            })
    }

    /// Look up a binding and check it serves payload `P`.
    ///
    /// # Errors
    ///
    /// - [`OrderError::InvalidOrderType`] if the tag is not registered
    /// - [`OrderError::ServiceContractMismatch`] if it serves another shape
    pub fn resolve_as<P: OrderPayload>(
        &self,
        order_type: &str,
    ) -> Result<Arc<dyn OrderService<Payload = P>>> {
        self.dispatch(order_type)?.as_typed::<P>()
    }

    /// Registered tags, sorted
    #[must_use]
    pub fn order_types(&self) -> Vec<OrderType> {
        let mut types: Vec<OrderType> = self.read().services.keys().cloned().collect();
        types.sort();
        types
    }
}
