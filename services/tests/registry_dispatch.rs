//! Dispatch of order requests through the frozen registry.

#![allow(clippy::unwrap_used)]

use opsorder_coordination::memory::InMemoryCoordinationStore;
use opsorder_core::error::OrderError;
use opsorder_core::lifecycle::can_transition;
use opsorder_core::payload::{
    AnyPayload, ElasticScalingPayload, GeneralPayload, MaintenancePayload, OrderPayload,
};
use opsorder_core::registry::OrderRegistry;
use opsorder_core::service::ListFilter;
use opsorder_core::types::{OrderId, OrderStatus, OrderType};
use opsorder_services::{OrderRepositories, ServiceConfig, ServiceContext, build_registry};
use opsorder_testing::properties::transition_request;
use opsorder_testing::{InMemoryDeviceSource, InMemoryOrderRepository, fixtures, test_clock};
use proptest::prelude::*;
use std::sync::Arc;

fn registry() -> OrderRegistry {
    let context = ServiceContext::new(
        Arc::new(InMemoryCoordinationStore::new()),
        Arc::new(InMemoryDeviceSource::new(fixtures::fleet())),
        Arc::new(test_clock()),
        ServiceConfig::default(),
    );
    build_registry(
        &context,
        OrderRepositories {
            general: InMemoryOrderRepository::<GeneralPayload>::shared(),
            elastic_scaling: InMemoryOrderRepository::<ElasticScalingPayload>::shared(),
            maintenance: InMemoryOrderRepository::<MaintenancePayload>::shared(),
        },
    )
    .unwrap()
}

#[test]
fn unregistered_tag_is_invalid_order_type() {
    let registry = registry();
    let err = registry.dispatch("firmware-rollout").unwrap_err();
    assert_eq!(
        err,
        OrderError::InvalidOrderType {
            order_type: "firmware-rollout".to_string()
        }
    );
    assert_eq!(err.error_code(), "invalid_order_type");
}

#[test]
fn tags_are_case_sensitive() {
    assert!(registry().resolve("Maintenance").is_none());
}

#[test]
fn resolve_as_checks_the_payload_shape() {
    let registry = registry();
    assert!(registry.resolve_as::<MaintenancePayload>(OrderType::MAINTENANCE).is_ok());

    let err = registry
        .resolve_as::<GeneralPayload>(OrderType::MAINTENANCE)
        .err()
        .unwrap();
    assert!(matches!(err, OrderError::ServiceContractMismatch { .. }));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn mismatched_payload_is_rejected_before_the_service() {
    let registry = registry();
    let general = registry.dispatch(OrderType::GENERAL).unwrap();

    let err = general
        .create_order(fixtures::maintenance_payload(&["dev-1"]).into_any(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ServiceContractMismatch { .. }));
    assert_eq!(general.list_orders(ListFilter::default()).await.unwrap().total, 0);
}

#[tokio::test]
async fn each_tag_keeps_its_own_orders() {
    let registry = registry();
    let general = registry.dispatch(OrderType::GENERAL).unwrap();
    let scaling = registry.dispatch(OrderType::ELASTIC_SCALING).unwrap();

    let g = general
        .create_order(fixtures::general_payload().into_any(), "alice")
        .await
        .unwrap();
    let s = scaling
        .create_order(fixtures::scale_in_payload(&["dev-2"]).into_any(), "alice")
        .await
        .unwrap();
    assert_eq!(g.id, OrderId::new(1));
    assert_eq!(s.id, OrderId::new(1));
    assert_eq!(s.order_type, OrderType::elastic_scaling());
    assert!(matches!(s.payload, AnyPayload::ElasticScaling(_)));

    // Same id, separate lock keys: both transitions go through.
    general.process(g.id, "ops-bot", None).await.unwrap();
    let s = scaling.cancel(s.id, "ops-bot", None).await.unwrap();
    assert_eq!(s.status(), OrderStatus::Cancelled);
    assert_eq!(
        general.get_order(g.id).await.unwrap().status(),
        OrderStatus::Processing
    );
}

#[tokio::test]
async fn erased_fail_reports_history() {
    let registry = registry();
    let maintenance = registry.dispatch(OrderType::MAINTENANCE).unwrap();
    let order = maintenance
        .create_order(fixtures::maintenance_payload(&["dev-3"]).into_any(), "alice")
        .await
        .unwrap();

    maintenance.process(order.id, "ops-bot", None).await.unwrap();
    let failed = maintenance.fail(order.id, "ops-bot", "timeout").await.unwrap();

    let last = failed.last_transition().unwrap();
    assert_eq!((last.from, last.to), (OrderStatus::Processing, OrderStatus::Failed));
    assert_eq!(last.actor, "ops-bot");
    assert_eq!(last.reason.as_deref(), Some("timeout"));
    assert_eq!(failed.history().len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transitions_follow_the_table(requests in prop::collection::vec(transition_request(), 1..8)) {
        tokio_test::block_on(async {
            let registry = registry();
            let general = registry.dispatch(OrderType::GENERAL).unwrap();
            let order = general
                .create_order(fixtures::general_payload().into_any(), "alice")
                .await
                .unwrap();

            let mut status = OrderStatus::Pending;
            let mut accepted = 0;
            for request in requests {
                let target = request.target;
                let reason_ok = target != OrderStatus::Failed
                    || request.reason.as_deref().is_some_and(|r| !r.trim().is_empty());

                match general.update_order_status(order.id, request).await {
                    Ok(updated) => {
                        prop_assert!(can_transition(status, target));
                        prop_assert!(reason_ok);
                        prop_assert_eq!(updated.status(), target);
                        status = target;
                        accepted += 1;
                    },
                    Err(OrderError::InvalidTransition { from, to }) => {
                        prop_assert_eq!(from, status);
                        prop_assert_eq!(to, target);
                        prop_assert!(!can_transition(status, target));
                    },
                    Err(OrderError::Validation(_)) => {
                        prop_assert!(can_transition(status, target));
                        prop_assert!(!reason_ok);
                    },
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
            }

            let stored = general.get_order(order.id).await.unwrap();
            prop_assert_eq!(stored.status(), status);
            prop_assert_eq!(stored.history().len(), accepted);
            Ok(())
        })?;
    }
}
