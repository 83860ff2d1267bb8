//! Startup wiring: build the order services and register them.

use crate::config::ServiceConfig;
use crate::order_service::{
    ElasticScalingOrderService, GeneralOrderService, LifecycleOrderService, MaintenanceOrderService,
};
use opsorder_coordination::device_cache::{DeviceCache, DeviceSource};
use opsorder_coordination::store::CoordinationStore;
use opsorder_core::environment::Clock;
use opsorder_core::error::Result;
use opsorder_core::payload::{ElasticScalingPayload, GeneralPayload, MaintenancePayload};
use opsorder_core::registry::{OrderRegistry, RegisteredService};
use opsorder_core::repository::OrderRepository;
use opsorder_core::types::OrderType;
use std::sync::Arc;

/// Shared collaborators every order service is built from.
#[derive(Clone)]
pub struct ServiceContext {
    /// Coordination store for locks, cache and notifications
    pub store: Arc<dyn CoordinationStore>,
    /// Device cache invalidated after transitions
    pub device_cache: DeviceCache,
    /// Time source for history entries
    pub clock: Arc<dyn Clock>,
    /// Settings
    pub config: ServiceConfig,
}

impl ServiceContext {
    /// Build the context, creating the device cache from `config`.
    #[must_use]
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        devices: Arc<dyn DeviceSource>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        let device_cache = DeviceCache::new(
            Arc::clone(&store),
            devices,
            config.coordination.namespace(),
        )
        .with_ttl(config.coordination.cache_ttl())
        .with_scan_batch_size(config.coordination.scan_batch_size);

        Self {
            store,
            device_cache,
            clock,
            config,
        }
    }

    fn service<P>(
        &self,
        order_type: OrderType,
        repository: Arc<dyn OrderRepository<P>>,
    ) -> LifecycleOrderService<P>
    where
        P: opsorder_core::payload::OrderPayload,
    {
        LifecycleOrderService::from_config(
            order_type,
            repository,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            &self.config,
        )
        .with_device_cache(self.device_cache.clone())
    }

    /// Service for `general` orders
    #[must_use]
    pub fn general_service(
        &self,
        repository: Arc<dyn OrderRepository<GeneralPayload>>,
    ) -> GeneralOrderService {
        self.service(OrderType::general(), repository)
    }

    /// Service for `elastic-scaling` orders
    #[must_use]
    pub fn elastic_scaling_service(
        &self,
        repository: Arc<dyn OrderRepository<ElasticScalingPayload>>,
    ) -> ElasticScalingOrderService {
        self.service(OrderType::elastic_scaling(), repository)
    }

    /// Service for `maintenance` orders
    #[must_use]
    pub fn maintenance_service(
        &self,
        repository: Arc<dyn OrderRepository<MaintenancePayload>>,
    ) -> MaintenanceOrderService {
        self.service(OrderType::maintenance(), repository)
    }
}

/// Persistence for each built-in order type.
#[derive(Clone)]
pub struct OrderRepositories {
    /// `general` orders
    pub general: Arc<dyn OrderRepository<GeneralPayload>>,
    /// `elastic-scaling` orders
    pub elastic_scaling: Arc<dyn OrderRepository<ElasticScalingPayload>>,
    /// `maintenance` orders
    pub maintenance: Arc<dyn OrderRepository<MaintenancePayload>>,
}

/// Register the three built-in order types and freeze the registry.
///
/// # Errors
///
/// Returns [`OrderError::DuplicateRegistration`](opsorder_core::error::OrderError::DuplicateRegistration)
/// only if a tag is bound twice, which indicates a wiring bug.
pub fn build_registry(context: &ServiceContext, repositories: OrderRepositories) -> Result<OrderRegistry> {
    let registry = OrderRegistry::new();

    registry.register(
        OrderType::general(),
        RegisteredService::new(Arc::new(context.general_service(repositories.general))),
    )?;
    registry.register(
        OrderType::elastic_scaling(),
        RegisteredService::new(Arc::new(
            context.elastic_scaling_service(repositories.elastic_scaling),
        )),
    )?;
    registry.register(
        OrderType::maintenance(),
        RegisteredService::new(Arc::new(context.maintenance_service(repositories.maintenance))),
    )?;

    registry.freeze();
    tracing::info!(order_types = ?registry.order_types(), "Order registry ready");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use opsorder_coordination::memory::InMemoryCoordinationStore;
    use opsorder_core::error::OrderError;
    use opsorder_testing::{InMemoryDeviceSource, InMemoryOrderRepository, fixtures, test_clock};

    fn context() -> ServiceContext {
        ServiceContext::new(
            Arc::new(InMemoryCoordinationStore::new()),
            Arc::new(InMemoryDeviceSource::new(fixtures::fleet())),
            Arc::new(test_clock()),
            ServiceConfig::default(),
        )
    }

    fn repositories() -> OrderRepositories {
        OrderRepositories {
            general: InMemoryOrderRepository::<GeneralPayload>::shared(),
            elastic_scaling: InMemoryOrderRepository::<ElasticScalingPayload>::shared(),
            maintenance: InMemoryOrderRepository::<MaintenancePayload>::shared(),
        }
    }

    #[test]
    fn registers_builtin_types_and_freezes() {
        let registry = build_registry(&context(), repositories()).unwrap();

        assert_eq!(
            registry.order_types(),
            vec![
                OrderType::elastic_scaling(),
                OrderType::general(),
                OrderType::maintenance()
            ]
        );
        assert!(registry.is_frozen());

        let late = context().general_service(InMemoryOrderRepository::<GeneralPayload>::shared());
        let err = registry
            .register(OrderType::new("late"), RegisteredService::new(Arc::new(late)))
            .unwrap_err();
        assert_eq!(err, OrderError::RegistryFrozen);
    }
}
