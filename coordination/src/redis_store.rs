//! Redis-backed coordination store.
//!
//! # Architecture
//!
//! - **Values**: plain string keys, `PSETEX` when an expiry is given
//! - **Locks**: `SET key owner NX PX ttl`, released by a compare-and-delete Lua script
//! - **Enumeration**: `SCAN cursor MATCH pattern COUNT n`, never `KEYS`
//! - **Pub/sub**: `PUBLISH` on the shared connection, a dedicated connection per subscriber
//!
//! # Example
//!
//! ```no_run
//! use opsorder_coordination::redis_store::RedisCoordinationStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisCoordinationStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{CoordinationError, Result};
use crate::store::{CoordinationStore, MessageStream, ScanPage, StoreFuture};
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;

// Deletes KEYS[1] only while it still holds ARGV[1].
const RELEASE_LOCK_SCRIPT: &str = r"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    else
        return 0
    end
";

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis implementation of [`CoordinationStore`].
///
/// Commands share one multiplexed `ConnectionManager` (reconnects automatically).
/// Each subscription opens its own pub/sub connection from the client.
#[derive(Clone)]
pub struct RedisCoordinationStore {
    client: Client,
    conn_manager: ConnectionManager,
    release_script: Script,
}

impl RedisCoordinationStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            CoordinationError::ConnectionFailed(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            CoordinationError::ConnectionFailed(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        tracing::info!(redis_url = %redis_url, "Connected coordination store to Redis");

        Ok(Self {
            client,
            conn_manager,
            release_script: Script::new(RELEASE_LOCK_SCRIPT),
        })
    }
}

impl CoordinationStore for RedisCoordinationStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let value: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| CoordinationError::command("GET", key, e))?;
            Ok(value)
        })
    }

    fn try_set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            match ttl {
                Some(ttl) => {
                    let _: () = conn
                        .pset_ex(key, value, ttl_millis(ttl))
                        .await
                        .map_err(|e| CoordinationError::command("PSETEX", key, e))?;
                },
                None => {
                    let _: () = conn
                        .set(key, value)
                        .await
                        .map_err(|e| CoordinationError::command("SET", key, e))?;
                },
            }
            Ok(())
        })
    }

    fn acquire_lock<'a>(
        &'a self,
        key: &'a str,
        owner: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            // Reply is "OK" when set, nil when the key already exists.
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(owner)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(|e| CoordinationError::command("SET NX", key, e))?;
            Ok(reply.is_some())
        })
    }

    fn release_lock<'a>(&'a self, key: &'a str, owner: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let deleted: i64 = self
                .release_script
                .key(key)
                .arg(owner)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| CoordinationError::command("EVALSHA", key, e))?;
            Ok(deleted > 0)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let exists: bool = conn
                .exists(key)
                .await
                .map_err(|e| CoordinationError::command("EXISTS", key, e))?;
            Ok(exists)
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let removed: usize = conn
                .del(key)
                .await
                .map_err(|e| CoordinationError::command("DEL", key, e))?;
            Ok(removed > 0)
        })
    }

    fn scan_page<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        count: usize,
    ) -> StoreFuture<'a, ScanPage> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count.max(1))
                .query_async(&mut conn)
                .await
                .map_err(|e| CoordinationError::command("SCAN", pattern, e))?;
            Ok(ScanPage { cursor, keys })
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let receivers: usize = conn
                .publish(channel, message)
                .await
                .map_err(|e| CoordinationError::command("PUBLISH", channel, e))?;
            Ok(receivers)
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, MessageStream> {
        Box::pin(async move {
            let subscription_error = |e: redis::RedisError| CoordinationError::SubscriptionFailed {
                channel: channel.to_string(),
                reason: e.to_string(),
            };

            let mut pubsub = self
                .client
                .get_async_pubsub()
                .await
                .map_err(subscription_error)?;
            pubsub.subscribe(channel).await.map_err(subscription_error)?;

            tracing::debug!(channel = %channel, "Subscribed to Redis channel");

            let channel = channel.to_string();
            let stream = pubsub.into_on_message().filter_map(move |msg| {
                let payload = msg.get_payload::<String>();
                let channel = channel.clone();
                async move {
                    match payload {
                        Ok(payload) => Some(payload),
                        Err(e) => {
                            tracing::warn!(channel = %channel, error = %e, "Dropping non-text pub/sub message");
                            None
                        },
                    }
                }
            });

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
