//! # Ops Orders Testing
//!
//! Testing utilities and in-memory collaborators for Ops Orders.
//!
//! This crate provides:
//! - Deterministic clocks
//! - An in-memory [`OrderRepository`](opsorder_core::repository::OrderRepository)
//! - An in-memory [`DeviceSource`](opsorder_coordination::device_cache::DeviceSource)
//! - Payload and device fixtures
//! - A Given-When-Then harness for lifecycle transitions
//! - proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use opsorder_testing::{LifecycleTest, fixtures};
//!
//! #[tokio::test]
//! async fn processing_order_can_fail() {
//!     LifecycleTest::new(service)
//!         .given_payload(fixtures::general_payload())
//!         .given_status(OrderStatus::Processing)
//!         .when_fail("ops-bot", "timeout")
//!         .then_order(|order| assert_eq!(order.status(), OrderStatus::Failed))
//!         .run()
//!         .await;
//! }
//! ```

use chrono::{DateTime, Utc};
use opsorder_core::environment::Clock;

pub mod devices;
pub mod fixtures;
pub mod repository;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use opsorder_testing::mocks::FixedClock;
    /// use opsorder_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that moves forward by a fixed step on every read.
    ///
    /// Useful when history entries must have strictly increasing timestamps.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: chrono::Duration,
    }

    impl SteppingClock {
        /// Start at `start`, advancing by `step` after each read
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
            let now = *next;
            *next = now + self.step;
            now
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// 2025-01-01 00:00:00 UTC
    ///
    /// # Panics
    ///
    /// Panics only if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use opsorder_core::lifecycle::TransitionRequest;
    use opsorder_core::types::OrderStatus;
    use proptest::prelude::*;

    /// Any order status
    pub fn order_status() -> impl Strategy<Value = OrderStatus> {
        proptest::sample::select(OrderStatus::ALL.to_vec())
    }

    /// Device identifiers like `dev-0042`
    pub fn device_id() -> impl Strategy<Value = String> {
        (0_u32..10_000).prop_map(|n| format!("dev-{n:04}"))
    }

    /// Transition requests with a non-blank executor and an optional reason
    pub fn transition_request() -> impl Strategy<Value = TransitionRequest> {
        (
            order_status(),
            "[a-z]{1,8}",
            proptest::option::of("[a-z ]{0,12}"),
        )
            .prop_map(|(target, executor, reason)| TransitionRequest::new(target, executor, reason))
    }
}

/// Install a test-friendly `tracing` subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use devices::InMemoryDeviceSource;
pub use lifecycle_test::LifecycleTest;
pub use mocks::{FixedClock, SteppingClock, test_clock};
pub use repository::InMemoryOrderRepository;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn stepping_clock_advances() {
        let clock = SteppingClock::new(mocks::test_epoch(), chrono::Duration::seconds(1));
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, chrono::Duration::seconds(1));
    }
}
