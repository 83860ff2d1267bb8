//! # Ops Orders Coordination
//!
//! Shared-state primitives that let independent processes mutate the same orders and
//! devices safely:
//!
//! - **Keys**: [`KeyNamespace`](keys::KeyNamespace) builds collision-free hierarchical keys
//! - **Store**: [`CoordinationStore`](store::CoordinationStore) over Redis or memory
//! - **Locks**: [`DistributedLock`](lock::DistributedLock), non-blocking with owner tokens
//! - **Device cache**: [`DeviceCache`](device_cache::DeviceCache), read-through with TTL
//!
//! ## Example
//!
//! ```ignore
//! use opsorder_coordination::prelude::*;
//!
//! let config = CoordinationConfig::from_env();
//! let store: Arc<dyn CoordinationStore> = Arc::new(RedisCoordinationStore::new(&config.redis_url).await?);
//! let locks = DistributedLock::new(store.clone(), config.lock_ttl());
//! let key = config.namespace().lock_key("order", "42");
//! match locks.try_acquire(&key).await? {
//!     Some(handle) => { /* mutate */ handle.release().await?; }
//!     None => { /* already in progress */ }
//! }
//! ```

pub mod config;
pub mod device_cache;
pub mod error;
pub mod keys;
pub mod lock;
pub mod memory;
pub mod redis_store;
pub mod store;

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::CoordinationConfig;
    pub use crate::device_cache::{
        DEFAULT_CACHE_TTL, DEVICE_MODULE, Device, DeviceCache, DeviceField, DeviceQuery,
        DeviceSource, DeviceStatus, DeviceSummary,
    };
    pub use crate::error::{CoordinationError, Result};
    pub use crate::keys::{CacheKey, KeyNamespace, Qualifier};
    pub use crate::lock::{DistributedLock, LockHandle, RetryPolicy};
    pub use crate::memory::InMemoryCoordinationStore;
    pub use crate::redis_store::RedisCoordinationStore;
    pub use crate::store::{CoordinationStore, MessageStream, ScanPage, StoreFuture};
}
