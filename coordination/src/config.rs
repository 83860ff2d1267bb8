//! Coordination store configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::keys::KeyNamespace;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Store, key namespace and TTL settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Global key prefix
    pub key_prefix: String,
    /// Key version tag, bump to orphan every cached entry at once
    pub key_version: String,
    /// TTL of device cache entries in seconds (default: 24 hours)
    pub cache_ttl_secs: u64,
    /// Keys requested per SCAN round
    pub scan_batch_size: usize,
    /// TTL of order locks in seconds
    pub lock_ttl_secs: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "opsorder".to_string(),
            key_version: "v1".to_string(),
            cache_ttl_secs: 86_400,
            scan_batch_size: 100,
            lock_ttl_secs: 30,
        }
    }
}

impl CoordinationConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to [`Default`].
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: env::var("OPSORDER_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            key_version: env::var("OPSORDER_KEY_VERSION").unwrap_or(defaults.key_version),
            cache_ttl_secs: env::var("OPSORDER_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_ttl_secs),
            scan_batch_size: env::var("OPSORDER_SCAN_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.scan_batch_size),
            lock_ttl_secs: env::var("OPSORDER_LOCK_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.lock_ttl_secs),
        }
    }

    /// Key namespace for these settings
    #[must_use]
    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.key_prefix.clone(), self.key_version.clone())
    }

    /// Device cache TTL
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Lock TTL
    #[must_use]
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CoordinationConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.lock_ttl(), Duration::from_secs(30));
        assert_eq!(config.namespace().entity_key("device", "d1"), "opsorder:device:v1:item:d1");
    }
}
