//! Non-blocking distributed locks with owner tokens.
//!
//! [`DistributedLock::try_acquire`] makes exactly one attempt and reports contention
//! immediately. Callers that want to wait opt in to [`DistributedLock::acquire_with_retry`],
//! which layers exponential backoff with jitter on top of repeated single attempts.
//!
//! # Example
//!
//! ```ignore
//! let locks = DistributedLock::new(store.clone(), Duration::from_secs(30));
//! if let Some(handle) = locks.try_acquire("opsorder:order:v1:lock:42").await? {
//!     // read-modify-write
//!     handle.release().await?;
//! }
//! ```

use crate::error::Result;
use crate::store::CoordinationStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Backoff schedule for [`DistributedLock::acquire_with_retry`].
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 50ms
/// - `max_delay`: 2 seconds
/// - `multiplier`: 2.0
/// - `jitter`: true
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Randomize each delay within `[0, delay]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Upper bound of the delay before retry `attempt` (0-based).
    ///
    /// `initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let cap_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(cap_ms).max(0.0) as u64)
    }

    fn sleep_duration(&self, attempt: usize) -> Duration {
        let ceiling = self.delay_for_attempt(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
    }
}

/// A held lock. Dropping it without calling [`release`](Self::release) leaves the key to
/// expire with its TTL.
pub struct LockHandle {
    store: Arc<dyn CoordinationStore>,
    key: String,
    token: String,
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl LockHandle {
    /// Lock key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owner token written into the lock
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Release the lock if this handle still owns it.
    ///
    /// Returns `false` when the lock already expired and possibly passed to someone else;
    /// that holder's lock is left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the store command fails.
    pub async fn release(self) -> Result<bool> {
        let released = self.store.release_lock(&self.key, &self.token).await?;
        if released {
            tracing::debug!(key = %self.key, "Released lock");
        } else {
            tracing::warn!(key = %self.key, "Lock expired before release");
        }
        Ok(released)
    }
}

/// Issues [`LockHandle`]s against a coordination store.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn CoordinationStore>,
    ttl: Duration,
}

impl DistributedLock {
    /// Create a lock issuer whose locks expire after `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn CoordinationStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// TTL applied to every acquired lock
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Single non-blocking attempt. `Ok(None)` means someone else holds the lock.
    ///
    /// # Errors
    ///
    /// Returns error if the store command fails.
    pub async fn try_acquire(&self, key: &str) -> Result<Option<LockHandle>> {
        let token = Uuid::new_v4().to_string();

        if self.store.acquire_lock(key, &token, self.ttl).await? {
            metrics::counter!("opsorder.lock.acquired").increment(1);
            tracing::debug!(key = %key, "Acquired lock");
            Ok(Some(LockHandle {
                store: Arc::clone(&self.store),
                key: key.to_string(),
                token,
            }))
        } else {
            metrics::counter!("opsorder.lock.contended").increment(1);
            tracing::debug!(key = %key, "Lock held elsewhere");
            Ok(None)
        }
    }

    /// Retry [`try_acquire`](Self::try_acquire) with backoff until it succeeds or the
    /// policy is exhausted. Store errors are returned immediately, not retried.
    ///
    /// # Errors
    ///
    /// Returns error if a store command fails.
    pub async fn acquire_with_retry(
        &self,
        key: &str,
        policy: &RetryPolicy,
    ) -> Result<Option<LockHandle>> {
        let mut attempt = 0;
        loop {
            if let Some(handle) = self.try_acquire(key).await? {
                if attempt > 0 {
                    tracing::info!(key = %key, attempt, "Acquired lock after retry");
                }
                return Ok(Some(handle));
            }
            if attempt >= policy.max_retries {
                tracing::warn!(key = %key, attempts = attempt + 1, "Gave up waiting for lock");
                return Ok(None);
            }
            sleep(policy.sleep_duration(attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory::InMemoryCoordinationStore;

    fn locks(ttl: Duration) -> DistributedLock {
        DistributedLock::new(Arc::new(InMemoryCoordinationStore::new()), ttl)
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(2));
    }

    #[test]
    fn jitter_stays_below_ceiling() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            assert!(policy.sleep_duration(attempt) <= policy.delay_for_attempt(attempt));
        }
    }

    #[tokio::test]
    async fn second_acquire_reports_contention() {
        let locks = locks(Duration::from_secs(30));
        let first = locks.try_acquire("order:42").await.unwrap();
        assert!(first.is_some());
        assert!(locks.try_acquire("order:42").await.unwrap().is_none());

        assert!(first.unwrap().release().await.unwrap());
        assert!(locks.try_acquire("order:42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_handle_does_not_release_new_owner() {
        let locks = locks(Duration::from_millis(10));
        let stale = locks.try_acquire("order:7").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let fresh = locks.try_acquire("order:7").await.unwrap().unwrap();
        assert_ne!(stale.token(), fresh.token());
        assert!(!stale.release().await.unwrap());
        assert!(locks.try_acquire("order:7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_waits_for_expiry() {
        let locks = locks(Duration::from_millis(40));
        let _held = locks.try_acquire("order:9").await.unwrap().unwrap();

        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(20),
            multiplier: 1.0,
            jitter: false,
        };
        let handle = locks.acquire_with_retry("order:9", &policy).await.unwrap();
        assert!(handle.is_some());
    }

    #[tokio::test]
    async fn retry_gives_up() {
        let locks = locks(Duration::from_secs(30));
        let _held = locks.try_acquire("order:1").await.unwrap().unwrap();
        let handle = locks.acquire_with_retry("order:1", &RetryPolicy::none()).await.unwrap();
        assert!(handle.is_none());
    }
}
