//! Coordination store abstraction.
//!
//! [`CoordinationStore`] wraps a key-value store (Redis in production, the in-memory store
//! in tests) and exposes exactly what concurrent order handlers need to share state:
//!
//! - plain reads and best-effort writes with expiry
//! - a **non-blocking** lock (`SET key owner NX PX ttl`)
//! - cursor-based key enumeration
//! - at-most-once publish/subscribe
//!
//! # Dyn Compatibility
//!
//! Methods return explicitly boxed futures so the store can be shared as
//! `Arc<dyn CoordinationStore>` by the device cache, locks and order services.

use crate::error::Result;
use futures::Stream;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Stream of messages received on a subscribed channel.
///
/// The stream ends when the underlying subscription closes. Messages published while
/// nobody was listening are never replayed.
pub type MessageStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// One round of cursor-based key enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next round; `0` means iteration is complete
    pub cursor: u64,
    /// Keys matched in this round (may repeat keys from earlier rounds)
    pub keys: Vec<String>,
}

/// Key-value store used for locks, caches and notifications.
pub trait CoordinationStore: Send + Sync {
    /// Read a value. A miss is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be reached or the command fails.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Write a value and report failures. `ttl = None` stores without expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn try_set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> StoreFuture<'a, ()>;

    /// Set `key` to `owner` only if absent, with a TTL.
    ///
    /// Never waits: returns `Ok(false)` immediately when someone else holds the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    fn acquire_lock<'a>(
        &'a self,
        key: &'a str,
        owner: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, bool>;

    /// Delete `key` only if it still holds `owner`. Returns whether it was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    fn release_lock<'a>(&'a self, key: &'a str, owner: &'a str) -> StoreFuture<'a, bool>;

    /// Whether a live value exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Delete a key. Returns whether something was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// One round of cursor iteration over keys matching a glob `pattern`.
    ///
    /// `count` bounds the work done per round; start with cursor `0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    fn scan_page<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        count: usize,
    ) -> StoreFuture<'a, ScanPage>;

    /// Publish to a channel, returning how many subscribers received it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, usize>;

    /// Subscribe to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, MessageStream>;

    /// Best-effort write: failures are logged and swallowed.
    ///
    /// Use [`try_set`](Self::try_set) when the caller needs to know.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Err(e) = self.try_set(key, value, ttl).await {
                tracing::warn!(key = %key, error = %e, "Coordination store write failed (ignored)");
            }
        })
    }

    /// Best-effort write with a mandatory expiry.
    fn set_with_expiry<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        self.set(key, value, Some(ttl))
    }

    /// Every key matching `pattern`, each exactly once.
    ///
    /// Iterates with [`scan_page`](Self::scan_page) in rounds of at most `batch_size`
    /// until the cursor returns to `0`, so the server never runs one unbounded listing.
    ///
    /// # Errors
    ///
    /// Returns the first error from any round.
    fn scan_keys<'a>(&'a self, pattern: &'a str, batch_size: usize) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let count = batch_size.max(1);
            let mut cursor = 0;
            let mut rounds = 0_usize;
            let mut seen = HashSet::new();
            let mut keys = Vec::new();

            loop {
                let page = self.scan_page(cursor, pattern, count).await?;
                rounds += 1;
                for key in page.keys {
                    if seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }
                if page.cursor == 0 {
                    break;
                }
                cursor = page.cursor;
            }

            tracing::debug!(
                pattern = %pattern,
                matched = keys.len(),
                rounds = rounds,
                "Scanned coordination store keys"
            );
            Ok(keys)
        })
    }
}
