//! Device cache behaviour around the order services when the inventory changes or fails.

#![allow(clippy::unwrap_used)]

use opsorder_coordination::device_cache::{DeviceCache, DeviceStatus};
use opsorder_coordination::error::CoordinationError;
use opsorder_coordination::keys::KeyNamespace;
use opsorder_coordination::memory::InMemoryCoordinationStore;
use opsorder_core::payload::MaintenancePayload;
use opsorder_core::service::{CreateOrderRequest, OrderService};
use opsorder_core::types::OrderStatus;
use opsorder_services::{ServiceConfig, ServiceContext};
use opsorder_testing::properties::device_id;
use opsorder_testing::{InMemoryDeviceSource, InMemoryOrderRepository, fixtures, test_clock};
use proptest::prelude::*;
use std::sync::Arc;

fn cache_over(source: Arc<InMemoryDeviceSource>) -> DeviceCache {
    DeviceCache::new(
        Arc::new(InMemoryCoordinationStore::new()),
        source,
        KeyNamespace::new("opsorder", "v1"),
    )
}

#[tokio::test]
async fn inventory_outage_on_a_miss_is_reported() {
    let source = Arc::new(InMemoryDeviceSource::new(fixtures::fleet()));
    let cache = cache_over(source.clone());
    source.set_unavailable(true);

    let err = cache.get_device("dev-1").await.unwrap_err();
    assert!(matches!(err, CoordinationError::Source(_)));
    assert!(matches!(cache.summary().await.unwrap_err(), CoordinationError::Source(_)));
    assert!(matches!(
        cache.special_devices().await.unwrap_err(),
        CoordinationError::Source(_)
    ));

    source.set_unavailable(false);
    assert_eq!(cache.get_device("dev-1").await.unwrap().unwrap().id, "dev-1");
}

#[tokio::test]
async fn cached_entries_are_served_during_an_outage() {
    let source = Arc::new(InMemoryDeviceSource::new(fixtures::fleet()));
    let cache = cache_over(source.clone());
    cache.get_device("dev-2").await.unwrap();
    let reads = source.reads();

    source.set_unavailable(true);

    assert_eq!(cache.get_device("dev-2").await.unwrap().unwrap().id, "dev-2");
    assert_eq!(source.reads(), reads);
}

#[tokio::test]
async fn transitions_succeed_while_the_inventory_is_down() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let source = Arc::new(InMemoryDeviceSource::new(fixtures::fleet()));
    let context = ServiceContext::new(
        store,
        source.clone(),
        Arc::new(test_clock()),
        ServiceConfig::default(),
    );
    let service =
        context.maintenance_service(InMemoryOrderRepository::<MaintenancePayload>::shared());
    let order = service
        .create_order(CreateOrderRequest::new(fixtures::maintenance_payload(&["dev-1"]), "alice"))
        .await
        .unwrap();
    context.device_cache.get_device("dev-1").await.unwrap();

    source.set_unavailable(true);
    let order = service.process(order.id, "ops-bot", None).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Processing);

    // Invalidation only deletes, so the next read needs the inventory again.
    assert!(context.device_cache.get_device("dev-1").await.is_err());
}

#[tokio::test]
async fn new_devices_appear_after_invalidation() {
    let source = Arc::new(InMemoryDeviceSource::new(fixtures::fleet()));
    let cache = cache_over(source.clone());
    assert_eq!(cache.summary().await.unwrap().total, 3);

    source.upsert(fixtures::device("dev-4", "cluster-b"));
    assert_eq!(cache.summary().await.unwrap().total, 3);

    cache.invalidate_device("dev-4").await.unwrap();
    assert_eq!(cache.summary().await.unwrap().total, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn invalidated_devices_are_reread(ids in prop::collection::btree_set(device_id(), 1..6)) {
        tokio_test::block_on(async {
            let source = Arc::new(InMemoryDeviceSource::new(Vec::new()));
            for id in &ids {
                source.upsert(fixtures::device(id, "cluster-a"));
            }
            let cache = cache_over(source.clone());
            for id in &ids {
                prop_assert_eq!(
                    cache.get_device(id).await.unwrap().unwrap().status,
                    DeviceStatus::Online
                );
            }
            prop_assert_eq!(cache.summary().await.unwrap().total, ids.len());

            for id in &ids {
                let mut device = fixtures::device(id, "cluster-a");
                device.status = DeviceStatus::Decommissioned;
                source.upsert(device);
            }
            let ids: Vec<&String> = ids.iter().collect();
            cache.invalidate_devices(&ids).await.unwrap();

            for id in &ids {
                prop_assert_eq!(
                    cache.get_device(id).await.unwrap().unwrap().status,
                    DeviceStatus::Decommissioned
                );
            }
            let summary = cache.summary().await.unwrap();
            prop_assert_eq!(
                summary.by_status.get(&DeviceStatus::Decommissioned).copied(),
                Some(ids.len())
            );
            Ok(())
        })?;
    }
}
