//! Service configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use opsorder_coordination::config::CoordinationConfig;
use serde::{Deserialize, Serialize};
use std::env;

/// Order service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Store, keys, TTLs
    pub coordination: CoordinationConfig,
    /// Pub/sub channel for order notifications
    pub notification_channel: String,
    /// Page size when a list request names none
    pub list_page_size: usize,
    /// Largest page a list request may ask for
    pub list_max_page_size: usize,
    /// Use Redis instead of the in-memory store (demo binary only)
    pub use_redis: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            coordination: CoordinationConfig::default(),
            notification_channel: "opsorder:order-events".to_string(),
            list_page_size: 20,
            list_max_page_size: 100,
            use_redis: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to [`Default`]. The default page size is
    /// clamped so it never exceeds the maximum.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let list_max_page_size = env::var("OPSORDER_LIST_MAX_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.list_max_page_size);
        let list_page_size = env::var("OPSORDER_LIST_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.list_page_size)
            .min(list_max_page_size);

        Self {
            coordination: CoordinationConfig::from_env(),
            notification_channel: env::var("OPSORDER_NOTIFICATION_CHANNEL")
                .unwrap_or(defaults.notification_channel),
            list_page_size,
            list_max_page_size,
            use_redis: env::var("OPSORDER_USE_REDIS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.use_redis),
        }
    }
}
