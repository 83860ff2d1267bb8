//! Ops Orders demo.
//!
//! Runs a maintenance order through its lifecycle, showing dispatch by tag, lock-guarded
//! transitions, device cache invalidation and change notifications.
//!
//! # Usage
//!
//! Run against the in-memory store:
//! ```bash
//! cargo run --bin opsorder-demo --features demo
//! ```
//!
//! Run against Redis:
//! ```bash
//! OPSORDER_USE_REDIS=1 REDIS_URL=redis://localhost:6379 cargo run --bin opsorder-demo --features demo
//! ```

use anyhow::Context;
use opsorder_coordination::device_cache::{DeviceQuery, DeviceStatus};
use opsorder_coordination::memory::InMemoryCoordinationStore;
use opsorder_coordination::redis_store::RedisCoordinationStore;
use opsorder_coordination::store::CoordinationStore;
use opsorder_core::environment::SystemClock;
use opsorder_core::error::OrderError;
use opsorder_core::payload::{ElasticScalingPayload, GeneralPayload, MaintenancePayload, OrderPayload};
use opsorder_core::service::ListFilter;
use opsorder_core::types::OrderType;
use opsorder_services::{
    NotificationListener, OrderRepositories, ServiceConfig, ServiceContext, build_registry,
};
use opsorder_testing::{InMemoryDeviceSource, InMemoryOrderRepository, fixtures};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env();
    info!(?config, "=== Ops Orders demo ===");

    let store: Arc<dyn CoordinationStore> = if config.use_redis {
        Arc::new(
            RedisCoordinationStore::new(&config.coordination.redis_url)
                .await
                .context("connecting to Redis")?,
        )
    } else {
        Arc::new(InMemoryCoordinationStore::new())
    };

    let devices = Arc::new(InMemoryDeviceSource::new(fixtures::fleet()));
    devices.set_special(vec!["dev-3".to_string()]);

    let context = ServiceContext::new(
        Arc::clone(&store),
        devices.clone(),
        Arc::new(SystemClock),
        config.clone(),
    );
    let registry = build_registry(
        &context,
        OrderRepositories {
            general: InMemoryOrderRepository::<GeneralPayload>::shared(),
            elastic_scaling: InMemoryOrderRepository::<ElasticScalingPayload>::shared(),
            maintenance: InMemoryOrderRepository::<MaintenancePayload>::shared(),
        },
    )?;

    let mut listener = NotificationListener::subscribe(store.as_ref(), &config.notification_channel).await?;
    let listener_task = tokio::spawn(async move {
        while let Some(notification) = listener.recv().await {
            info!(?notification, "Notification received");
        }
    });

    // Warm the cache so invalidation has something to clear.
    let cache = &context.device_cache;
    let before = cache.get_device("dev-1").await?;
    info!(?before, special = ?cache.special_devices().await?, "Device state before maintenance");

    match registry.dispatch("firmware-rollout") {
        Err(OrderError::InvalidOrderType { order_type }) => {
            info!(%order_type, "Unregistered order type rejected");
        },
        other => anyhow::bail!("expected InvalidOrderType, got {other:?}"),
    }

    let maintenance = registry.dispatch(OrderType::MAINTENANCE)?;
    let payload = fixtures::maintenance_payload(&["dev-1", "dev-2"]);
    let order = maintenance.create_order(payload.into_any(), "alice").await?;
    info!(order_id = %order.id, status = %order.status(), "Created maintenance order");

    if let Err(e) = maintenance.complete(order.id, "ops-bot", None).await {
        info!(error = %e, code = e.error_code(), "Pending order cannot complete directly");
    }

    maintenance.process(order.id, "ops-bot", None).await?;
    devices.set_status("dev-1", DeviceStatus::Maintenance);
    devices.set_status("dev-2", DeviceStatus::Maintenance);

    let typed = registry.resolve_as::<MaintenancePayload>(OrderType::MAINTENANCE)?;
    let finished = typed
        .complete(order.id, "ops-bot", Some("PSU replaced".to_string()))
        .await?;
    for entry in finished.history() {
        info!(from = %entry.from, to = %entry.to, actor = %entry.actor, reason = ?entry.reason, "History");
    }

    let after = cache.get_device("dev-1").await?;
    info!(?after, summary = ?cache.summary().await?, "Device state after maintenance");

    let in_maintenance = cache
        .list_devices(&DeviceQuery::all().with_status(DeviceStatus::Maintenance))
        .await?;
    info!(count = in_maintenance.len(), "Devices in maintenance");

    let page = maintenance.list_orders(ListFilter::default().with_creator("alice")).await?;
    info!(total = page.total, "Orders created by alice");

    // Give the listener a moment to drain before exiting.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    listener_task.abort();

    Ok(())
}
