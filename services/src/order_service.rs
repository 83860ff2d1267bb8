//! Order services backed by the lifecycle state machine.
//!
//! [`LifecycleOrderService`] implements [`OrderService`] once for every payload shape.
//! A status change runs as one read-modify-write under a per-order lock:
//!
//! 1. acquire the order lock without waiting (`LockContention` if held)
//! 2. load the order (`RecordNotFound` if missing)
//! 3. apply the transition through [`LifecycleStateMachine`]
//! 4. save the order
//! 5. release the lock, on success and failure alike
//! 6. invalidate cached state of the devices the payload touches
//! 7. publish a notification (best effort)
//!
//! Nothing is retried here; errors from any step are returned verbatim.

use crate::config::ServiceConfig;
use crate::notifications::{OrderNotification, OrderNotifier};
use opsorder_coordination::device_cache::DeviceCache;
use opsorder_coordination::keys::KeyNamespace;
use opsorder_coordination::lock::DistributedLock;
use opsorder_coordination::store::CoordinationStore;
use opsorder_core::environment::Clock;
use opsorder_core::error::{OrderError, Result};
use opsorder_core::lifecycle::{LifecycleStateMachine, TransitionRequest};
use opsorder_core::payload::{ElasticScalingPayload, GeneralPayload, MaintenancePayload, OrderPayload};
use opsorder_core::repository::OrderRepository;
use opsorder_core::service::{CreateOrderRequest, ListFilter, OrderPage, OrderService, ServiceFuture};
use opsorder_core::types::{HistoryEntry, NewOrder, Order, OrderId, OrderType};
use std::sync::Arc;
use std::time::Duration;

/// Module segment of order lock keys.
pub const ORDER_LOCK_MODULE: &str = "order";

/// General operational orders
pub type GeneralOrderService = LifecycleOrderService<GeneralPayload>;
/// Elastic scaling orders
pub type ElasticScalingOrderService = LifecycleOrderService<ElasticScalingPayload>;
/// Device maintenance orders
pub type MaintenanceOrderService = LifecycleOrderService<MaintenancePayload>;

/// [`OrderService`] for payload shape `P`, coordinating through a shared store.
pub struct LifecycleOrderService<P: OrderPayload> {
    order_type: OrderType,
    repository: Arc<dyn OrderRepository<P>>,
    store: Arc<dyn CoordinationStore>,
    locks: DistributedLock,
    namespace: KeyNamespace,
    clock: Arc<dyn Clock>,
    device_cache: Option<DeviceCache>,
    notifier: Option<OrderNotifier>,
    default_page_size: usize,
    max_page_size: usize,
}

impl<P: OrderPayload> std::fmt::Debug for LifecycleOrderService<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOrderService")
            .field("order_type", &self.order_type)
            .field("kind", &P::KIND)
            .field("lock_ttl", &self.locks.ttl())
            .field("device_cache", &self.device_cache.is_some())
            .field("notifier", &self.notifier.as_ref().map(OrderNotifier::channel))
            .finish_non_exhaustive()
    }
}

impl<P: OrderPayload> LifecycleOrderService<P> {
    /// Create a service with default settings and no cache or notifier.
    #[must_use]
    pub fn new(
        order_type: OrderType,
        repository: Arc<dyn OrderRepository<P>>,
        store: Arc<dyn CoordinationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let defaults = ServiceConfig::default();
        Self {
            order_type,
            repository,
            locks: DistributedLock::new(Arc::clone(&store), defaults.coordination.lock_ttl()),
            store,
            namespace: defaults.coordination.namespace(),
            clock,
            device_cache: None,
            notifier: None,
            default_page_size: defaults.list_page_size,
            max_page_size: defaults.list_max_page_size,
        }
    }

    /// Create a service wired from configuration: namespace, lock TTL, page sizes and a
    /// notifier on the configured channel.
    #[must_use]
    pub fn from_config(
        order_type: OrderType,
        repository: Arc<dyn OrderRepository<P>>,
        store: Arc<dyn CoordinationStore>,
        clock: Arc<dyn Clock>,
        config: &ServiceConfig,
    ) -> Self {
        let notifier = OrderNotifier::new(Arc::clone(&store), config.notification_channel.clone());
        Self::new(order_type, repository, store, clock)
            .with_namespace(config.coordination.namespace())
            .with_lock_ttl(config.coordination.lock_ttl())
            .with_page_sizes(config.list_page_size, config.list_max_page_size)
            .with_notifier(notifier)
    }

    /// Override the key namespace used for order locks
    #[must_use]
    pub fn with_namespace(mut self, namespace: KeyNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Override the order lock TTL
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.locks = DistributedLock::new(Arc::clone(&self.store), ttl);
        self
    }

    /// Invalidate device cache entries after transitions
    #[must_use]
    pub fn with_device_cache(mut self, cache: DeviceCache) -> Self {
        self.device_cache = Some(cache);
        self
    }

    /// Publish notifications on creation and transitions
    #[must_use]
    pub fn with_notifier(mut self, notifier: OrderNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Default and maximum list page sizes
    #[must_use]
    pub fn with_page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Lock key guarding one order
    #[must_use]
    pub fn lock_key(&self, id: OrderId) -> String {
        self.namespace
            .lock_key(ORDER_LOCK_MODULE, &format!("{}/{id}", self.order_type))
    }

    async fn transition_locked(
        &self,
        id: OrderId,
        request: TransitionRequest,
    ) -> Result<(Order<P>, HistoryEntry)> {
        let mut order = self
            .repository
            .get(id)
            .await?
            .ok_or(OrderError::RecordNotFound { order_id: id })?;

        let entry = LifecycleStateMachine::apply(&mut order, request, self.clock.now())?;
        self.repository.save(order.clone()).await?;
        Ok((order, entry))
    }

    async fn after_transition(&self, order: &Order<P>, entry: &HistoryEntry) {
        if let Some(cache) = &self.device_cache {
            let devices = order.payload.affected_devices();
            if let Err(e) = cache.invalidate_devices(&devices).await {
                tracing::error!(
                    order_id = %order.id,
                    devices = ?devices,
                    error = %e,
                    "Device cache invalidation failed, entries stay stale until TTL"
                );
            }
        }

        if let Some(notifier) = &self.notifier {
            notifier
                .publish(&OrderNotification::status_changed(order, entry))
                .await;
        }
    }
}

impl<P: OrderPayload> OrderService for LifecycleOrderService<P> {
    type Payload = P;

    fn order_type(&self) -> &OrderType {
        &self.order_type
    }

    fn create_order(&self, request: CreateOrderRequest<P>) -> ServiceFuture<'_, Order<P>> {
        Box::pin(async move {
            let created_by = request.created_by.trim();
            if created_by.is_empty() {
                return Err(OrderError::validation("created_by is required"));
            }
            request.payload.validate()?;

            let order = self
                .repository
                .insert(NewOrder {
                    order_type: self.order_type.clone(),
                    payload: request.payload,
                    created_by: created_by.to_string(),
                    created_at: self.clock.now(),
                })
                .await?;

            tracing::info!(
                order_id = %order.id,
                order_type = %order.order_type,
                created_by = %order.created_by,
                "Order created"
            );

            if let Some(notifier) = &self.notifier {
                notifier.publish(&OrderNotification::created(&order)).await;
            }
            Ok(order)
        })
    }

    fn get_order(&self, id: OrderId) -> ServiceFuture<'_, Order<P>> {
        Box::pin(async move {
            self.repository
                .get(id)
                .await?
                .ok_or(OrderError::RecordNotFound { order_id: id })
        })
    }

    fn list_orders(&self, filter: ListFilter) -> ServiceFuture<'_, OrderPage<P>> {
        Box::pin(async move {
            let filter = filter.normalized(self.default_page_size, self.max_page_size);
            self.repository.list(filter).await
        })
    }

    fn update_order_status(
        &self,
        id: OrderId,
        request: TransitionRequest,
    ) -> ServiceFuture<'_, Order<P>> {
        Box::pin(async move {
            let key = self.lock_key(id);
            let Some(lock) = self.locks.try_acquire(&key).await? else {
                tracing::warn!(
                    order_id = %id,
                    order_type = %self.order_type,
                    target = %request.target,
                    "Order is being mutated elsewhere"
                );
                return Err(OrderError::LockContention { key });
            };

            let outcome = self.transition_locked(id, request).await;

            if let Err(e) = lock.release().await {
                tracing::warn!(key = %key, error = %e, "Lock release failed, waiting for TTL");
            }

            let (order, entry) = outcome?;
            self.after_transition(&order, &entry).await;
            Ok(order)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use opsorder_coordination::memory::InMemoryCoordinationStore;
    use opsorder_core::types::OrderStatus;
    use opsorder_testing::{InMemoryOrderRepository, fixtures, test_clock};

    fn service() -> (GeneralOrderService, Arc<InMemoryCoordinationStore>) {
        let store = Arc::new(InMemoryCoordinationStore::new());
        let service = LifecycleOrderService::new(
            OrderType::general(),
            InMemoryOrderRepository::<GeneralPayload>::shared(),
            store.clone(),
            Arc::new(test_clock()),
        );
        (service, store)
    }

    #[test]
    fn lock_keys_are_scoped_by_order_type() {
        let (service, _) = service();
        assert_eq!(
            service.lock_key(OrderId::new(42)),
            "opsorder:order:v1:lock:general/42"
        );
    }

    #[test]
    fn page_sizes_are_clamped() {
        let (service, _) = service();
        let service = service.with_page_sizes(500, 50);
        assert_eq!(service.default_page_size, 50);
        assert_eq!(service.max_page_size, 50);
    }

    #[tokio::test]
    async fn blank_creator_is_rejected() {
        let (service, _) = service();
        let err = service
            .create_order(CreateOrderRequest::new(fixtures::general_payload(), "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn held_lock_reports_contention_without_touching_the_order() {
        let (service, store) = service();
        let order = service
            .create_order(CreateOrderRequest::new(fixtures::general_payload(), "alice"))
            .await
            .unwrap();

        let key = service.lock_key(order.id);
        assert!(store.acquire_lock(&key, "other-worker", Duration::from_secs(30)).await.unwrap());

        let err = service.process(order.id, "ops-bot", None).await.unwrap_err();
        assert_eq!(err, OrderError::LockContention { key });
        assert_eq!(service.get_order(order.id).await.unwrap().status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn lock_is_released_after_rejected_transition() {
        let (service, store) = service();
        let order = service
            .create_order(CreateOrderRequest::new(fixtures::general_payload(), "alice"))
            .await
            .unwrap();

        let err = service.complete(order.id, "ops-bot", None).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
        assert!(!store.exists(&service.lock_key(order.id)).await.unwrap());
    }
}
