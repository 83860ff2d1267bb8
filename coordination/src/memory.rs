//! In-process coordination store.
//!
//! Behaves like the Redis adapter for a single process: TTLs expire lazily on access and
//! during scans, locks are set-if-absent, and pub/sub fans out through
//! `tokio::sync::broadcast` with no replay.
//!
//! Keys are kept ordered. A scan cursor names the last key examined, so a scan resumes
//! strictly after it and keys removed behind the cursor never shift later keys out of view.
//!
//! Useful for tests and single-node deployments.

use crate::error::{CoordinationError, Result};
use crate::store::{CoordinationStore, MessageStream, ScanPage, StoreFuture};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const CHANNEL_CAPACITY: usize = 256;

/// Abandoned scans are forgotten oldest-first beyond this many open cursors.
const MAX_OPEN_CURSORS: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    channels: HashMap<String, broadcast::Sender<String>>,
    /// Open scan cursors mapped to the last key they examined
    cursors: BTreeMap<u64, String>,
    last_cursor: u64,
}

impl Inner {
    fn live(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn open_cursor(&mut self, resume_after: String) -> u64 {
        self.last_cursor = self.last_cursor.wrapping_add(1).max(1);
        self.cursors.insert(self.last_cursor, resume_after);
        while self.cursors.len() > MAX_OPEN_CURSORS {
            self.cursors.pop_first();
        }
        self.last_cursor
    }

    fn prune_channels(&mut self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

/// In-memory [`CoordinationStore`].
///
/// Cloning is cheap and every clone shares the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordinationStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryCoordinationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CoordinationError::ConnectionFailed("in-memory store lock poisoned".into()))
    }

    /// Number of live keys (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the internal lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self.lock()?.entries.values().filter(|e| e.is_live(now)).count())
    }

    /// Whether the store holds no live keys (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the internal lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remaining time to live of a key, `None` if missing or persistent (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the internal lock is poisoned.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        let mut inner = self.lock()?;
        Ok(inner
            .live(key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}

/// Redis-style glob match supporting `*`, `?`, `[...]` classes and `\` escapes.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_from(&pattern, &text)
}

fn glob_match_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            let rest = &pattern[1..];
            (0..=text.len()).any(|skip| glob_match_from(rest, &text[skip..]))
        },
        Some('?') => !text.is_empty() && glob_match_from(&pattern[1..], &text[1..]),
        Some('[') => {
            let Some((&c, text_rest)) = text.split_first() else {
                return false;
            };
            let Some(close) = pattern.iter().skip(1).position(|p| *p == ']') else {
                // Unterminated class: treat `[` literally.
                return c == '[' && glob_match_from(&pattern[1..], text_rest);
            };
            let class = &pattern[1..=close];
            let (negated, class) = match class.split_first() {
                Some(('^', rest)) => (true, rest),
                _ => (false, class),
            };
            let mut hit = false;
            let mut i = 0;
            while i < class.len() {
                if i + 2 < class.len() && class[i + 1] == '-' {
                    hit |= class[i] <= c && c <= class[i + 2];
                    i += 3;
                } else {
                    hit |= class[i] == c;
                    i += 1;
                }
            }
            hit != negated && glob_match_from(&pattern[close + 2..], text_rest)
        },
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && glob_match_from(&pattern[2..], &text[1..])
        },
        Some(p) => text.first() == Some(p) && glob_match_from(&pattern[1..], &text[1..]),
    }
}

impl CoordinationStore for InMemoryCoordinationStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let now = Instant::now();
            Ok(self.lock()?.live(key, now).map(|e| e.value.clone()))
        })
    }

    fn try_set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let entry = Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            };
            self.lock()?.entries.insert(key.to_string(), entry);
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
            let now = Instant::now();
            let mut inner = self.lock()?;
            if inner.live(key, now).is_some() {
                return Ok(false);
            }
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: owner.to_string(),
                    expires_at: Some(now + ttl),
                },
            );
            Ok(true)
        })
    }

    fn release_lock<'a>(&'a self, key: &'a str, owner: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut inner = self.lock()?;
            if inner.live(key, now).is_some_and(|e| e.value == owner) {
                inner.entries.remove(key);
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            Ok(self.lock()?.live(key, now).is_some())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut inner = self.lock()?;
            let was_live = inner.live(key, now).is_some();
            inner.entries.remove(key);
            Ok(was_live)
        })
    }

    fn scan_page<'a>(
        &'a self,
        cursor: u64,
        pattern: &'a str,
        count: usize,
    ) -> StoreFuture<'a, ScanPage> {
        Box::pin(async move {
            let now = Instant::now();
            let mut inner = self.lock()?;

            // An unknown cursor restarts the scan: keys may repeat but none are lost.
            let resume_after = match cursor {
                0 => None,
                id => inner.cursors.remove(&id),
            };
            let lower = resume_after
                .as_deref()
                .map_or(Bound::Unbounded, Bound::Excluded);

            let mut examined = inner
                .entries
                .range::<str, _>((lower, Bound::Unbounded))
                .take(count.max(1) + 1);
            let mut keys = Vec::new();
            let mut expired = Vec::new();
            let mut last = None;
            for (key, entry) in examined.by_ref().take(count.max(1)) {
                if !entry.is_live(now) {
                    expired.push(key.clone());
                } else if glob_match(pattern, key) {
                    keys.push(key.clone());
                }
                last = Some(key.clone());
            }
            let more = examined.next().is_some();

            for key in &expired {
                inner.entries.remove(key);
            }
            let next = match last {
                Some(last) if more => inner.open_cursor(last),
                _ => 0,
            };

            Ok(ScanPage { cursor: next, keys })
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let delivered = inner
                .channels
                .get(channel)
                .and_then(|tx| tx.send(message.to_string()).ok())
                .unwrap_or(0);
            if delivered == 0 {
                inner.channels.remove(channel);
            }
            Ok(delivered)
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, MessageStream> {
        Box::pin(async move {
            let mut rx = {
                let mut inner = self.lock()?;
                inner.prune_channels();
                inner
                    .channels
                    .entry(channel.to_string())
                    .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                    .subscribe()
            };
            let channel = channel.to_string();

            let stream = async_stream::stream! {
                loop {
                    match rx.recv().await {
                        Ok(message) => yield message,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(channel = %channel, skipped = skipped, "Subscriber lagged, messages dropped");
                        },
                        Err(RecvError::Closed) => break,
                    }
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
