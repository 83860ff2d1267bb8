//! Read-through cache over device records.
//!
//! # Entries
//!
//! | Entry | Key | Expiry |
//! |---|---|---|
//! | one device | `item:{device_id}` | TTL |
//! | filtered list | `list:{query}` | TTL |
//! | status summary | `list:summary` | TTL |
//! | lookup by field | `field:{field}:{value}` | TTL |
//! | special device set | `special:set` | none |
//!
//! Reads try the store first and fall back to the [`DeviceSource`] on a miss, writing the
//! result back with the configured TTL (24 hours by default). Changes to device state are
//! handled by deleting entries, never by patching cached values. Cache failures degrade to
//! source reads; only source failures are returned to the caller.

use crate::error::Result;
use crate::keys::KeyNamespace;
use crate::store::{CoordinationStore, StoreFuture};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Module segment for every device cache key.
pub const DEVICE_MODULE: &str = "device";

/// Default time to live of cached entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const SPECIAL_SET: &str = "set";
const SUMMARY: &str = "summary";
const DEFAULT_SCAN_BATCH: usize = 100;

/// Operational state of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Serving traffic
    Online,
    /// Unreachable
    Offline,
    /// Under a maintenance order
    Maintenance,
    /// Removed from service
    Decommissioned,
}

impl DeviceStatus {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
            Self::Decommissioned => "decommissioned",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device record as served by the system of record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier
    pub id: String,
    /// Host name
    pub hostname: String,
    /// Owning cluster
    pub cluster: String,
    /// Physical rack, if known
    pub rack: Option<String>,
    /// Current state
    pub status: DeviceStatus,
}

impl Device {
    /// Value of one lookup field
    #[must_use]
    pub fn field_value(&self, field: DeviceField) -> Option<&str> {
        match field {
            DeviceField::Cluster => Some(&self.cluster),
            DeviceField::Rack => self.rack.as_deref(),
            DeviceField::Status => Some(self.status.as_str()),
            DeviceField::Hostname => Some(&self.hostname),
        }
    }
}

/// Fields devices can be looked up by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceField {
    /// Owning cluster
    Cluster,
    /// Physical rack
    Rack,
    /// Device status
    Status,
    /// Host name
    Hostname,
}

impl DeviceField {
    /// Key segment
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Rack => "rack",
            Self::Status => "status",
            Self::Hostname => "hostname",
        }
    }
}

/// Filter for device lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceQuery {
    /// Only devices in this cluster
    pub cluster: Option<String>,
    /// Only devices in this state
    pub status: Option<DeviceStatus>,
}

impl DeviceQuery {
    /// Every device
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a cluster
    #[must_use]
    pub fn in_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Restrict to a status
    #[must_use]
    pub const fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether a device passes the filter
    #[must_use]
    pub fn matches(&self, device: &Device) -> bool {
        self.cluster.as_ref().is_none_or(|c| *c == device.cluster)
            && self.status.is_none_or(|s| s == device.status)
    }

    /// Stable identifier used as the list cache key.
    ///
    /// Equal queries always produce the same identifier; `"all"` for the empty filter.
    #[must_use]
    pub fn cache_identifier(&self) -> String {
        let mut parts = Vec::new();
        if let Some(cluster) = &self.cluster {
            // Length prefix keeps `cluster=a&...` from colliding with a cluster named `a&...`.
            parts.push(format!("cluster={}/{cluster}", cluster.len()));
        }
        if let Some(status) = self.status {
            parts.push(format!("status={status}"));
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join("&")
        }
    }
}

/// Device counts per status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Number of devices
    pub total: usize,
    /// Number of devices in each status that occurs
    pub by_status: BTreeMap<DeviceStatus, usize>,
}

impl DeviceSummary {
    /// Aggregate a device list
    #[must_use]
    pub fn from_devices(devices: &[Device]) -> Self {
        let mut by_status = BTreeMap::new();
        for device in devices {
            *by_status.entry(device.status).or_insert(0) += 1;
        }
        Self {
            total: devices.len(),
            by_status,
        }
    }
}

/// System of record for devices.
pub trait DeviceSource: Send + Sync {
    /// One device, `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Source`](crate::error::CoordinationError::Source) if the source cannot be read.
    fn fetch_device<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<Device>>;

    /// Devices matching a filter.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Source`](crate::error::CoordinationError::Source) if the source cannot be read.
    fn fetch_devices<'a>(&'a self, query: &'a DeviceQuery) -> StoreFuture<'a, Vec<Device>>;

    /// Identifiers of devices in the special set.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Source`](crate::error::CoordinationError::Source) if the source cannot be read.
    fn fetch_special_devices(&self) -> StoreFuture<'_, Vec<String>>;
}

/// Read-through device cache.
#[derive(Clone)]
pub struct DeviceCache {
    store: Arc<dyn CoordinationStore>,
    source: Arc<dyn DeviceSource>,
    namespace: KeyNamespace,
    ttl: Duration,
    scan_batch_size: usize,
}

impl fmt::Debug for DeviceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCache")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .field("scan_batch_size", &self.scan_batch_size)
            .finish_non_exhaustive()
    }
}

impl DeviceCache {
    /// Create a cache with the default TTL.
    #[must_use]
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        source: Arc<dyn DeviceSource>,
        namespace: KeyNamespace,
    ) -> Self {
        Self {
            store,
            source,
            namespace,
            ttl: DEFAULT_CACHE_TTL,
            scan_batch_size: DEFAULT_SCAN_BATCH,
        }
    }

    /// Override the TTL of cached entries
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the SCAN batch size used by invalidation
    #[must_use]
    pub fn with_scan_batch_size(mut self, batch_size: usize) -> Self {
        self.scan_batch_size = batch_size.max(1);
        self
    }

    /// TTL applied to cached entries
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str, entry: &'static str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to source");
                None
            },
        };

        let Some(raw) = raw else {
            metrics::counter!("opsorder.cache.miss", "entry" => entry).increment(1);
            return None;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                metrics::counter!("opsorder.cache.hit", "entry" => entry).increment(1);
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            },
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                metrics::counter!("opsorder.cache.miss", "entry" => entry).increment(1);
                if let Err(e) = self.store.delete(key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to delete undecodable cache entry");
                }
                None
            },
        }
    }

    async fn fill<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, &raw, ttl).await,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to encode cache entry"),
        }
    }

    /// One device by id. Unknown devices are not cached.
    ///
    /// # Errors
    ///
    /// Returns error if the device source fails on a cache miss.
    pub async fn get_device(&self, id: &str) -> Result<Option<Device>> {
        let key = self.namespace.entity_key(DEVICE_MODULE, id);
        if let Some(device) = self.lookup::<Device>(&key, "item").await {
            return Ok(Some(device));
        }

        let device = self.source.fetch_device(id).await?;
        if let Some(device) = &device {
            self.fill(&key, device, Some(self.ttl)).await;
        }
        Ok(device)
    }

    /// Devices matching a query.
    ///
    /// # Errors
    ///
    /// Returns error if the device source fails on a cache miss.
    pub async fn list_devices(&self, query: &DeviceQuery) -> Result<Vec<Device>> {
        let key = self.namespace.list_key(DEVICE_MODULE, &query.cache_identifier());
        if let Some(devices) = self.lookup::<Vec<Device>>(&key, "list").await {
            return Ok(devices);
        }

        let devices = self.source.fetch_devices(query).await?;
        self.fill(&key, &devices, Some(self.ttl)).await;
        Ok(devices)
    }

    /// Devices whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns error if the device source fails on a cache miss.
    pub async fn devices_by_field(&self, field: DeviceField, value: &str) -> Result<Vec<Device>> {
        let key = self.namespace.field_key(DEVICE_MODULE, field.as_str(), value);
        if let Some(devices) = self.lookup::<Vec<Device>>(&key, "field").await {
            return Ok(devices);
        }

        let query = match field {
            DeviceField::Cluster => DeviceQuery::all().in_cluster(value),
            _ => DeviceQuery::all(),
        };
        let devices: Vec<Device> = self
            .source
            .fetch_devices(&query)
            .await?
            .into_iter()
            .filter(|d| d.field_value(field) == Some(value))
            .collect();
        self.fill(&key, &devices, Some(self.ttl)).await;
        Ok(devices)
    }

    /// Device counts per status over every device.
    ///
    /// # Errors
    ///
    /// Returns error if the device source fails on a cache miss.
    pub async fn summary(&self) -> Result<DeviceSummary> {
        let key = self.namespace.list_key(DEVICE_MODULE, SUMMARY);
        if let Some(summary) = self.lookup::<DeviceSummary>(&key, "summary").await {
            return Ok(summary);
        }

        let devices = self.list_devices(&DeviceQuery::all()).await?;
        let summary = DeviceSummary::from_devices(&devices);
        self.fill(&key, &summary, Some(self.ttl)).await;
        Ok(summary)
    }

    /// The special device set. Cached without expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the device source fails on a cache miss.
    pub async fn special_devices(&self) -> Result<BTreeSet<String>> {
        let key = self.namespace.special_key(DEVICE_MODULE, SPECIAL_SET);
        if let Some(ids) = self.lookup::<BTreeSet<String>>(&key, "special").await {
            return Ok(ids);
        }

        let ids: BTreeSet<String> = self.source.fetch_special_devices().await?.into_iter().collect();
        self.fill(&key, &ids, None).await;
        Ok(ids)
    }

    /// Whether a device is in the special set.
    ///
    /// # Errors
    ///
    /// Returns error if the device source fails on a cache miss.
    pub async fn is_special(&self, id: &str) -> Result<bool> {
        Ok(self.special_devices().await?.contains(id))
    }

    async fn delete_matching(&self, pattern: &str, keep: Option<&str>) -> Result<usize> {
        let keys = self.store.scan_keys(pattern, self.scan_batch_size).await?;
        let mut deleted = 0;
        for key in keys.iter().filter(|k| Some(k.as_str()) != keep) {
            if self.store.delete(key).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Drop a device's entry and every list and field entry that may contain it.
    ///
    /// Returns the number of deleted entries.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails; some entries may already be gone.
    pub async fn invalidate_device(&self, id: &str) -> Result<usize> {
        self.invalidate_devices(&[id]).await
    }

    /// [`invalidate_device`](Self::invalidate_device) for several devices, scanning the
    /// list and field entries once.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails; some entries may already be gone.
    pub async fn invalidate_devices<S: AsRef<str> + Sync>(&self, ids: &[S]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        for id in ids {
            let key = self.namespace.entity_key(DEVICE_MODULE, id.as_ref());
            if self.store.delete(&key).await? {
                deleted += 1;
            }
        }
        deleted += self
            .delete_matching(&self.namespace.list_pattern(DEVICE_MODULE), None)
            .await?;
        deleted += self
            .delete_matching(&self.namespace.field_pattern(DEVICE_MODULE), None)
            .await?;

        tracing::debug!(devices = ids.len(), deleted, "Invalidated device cache entries");
        Ok(deleted)
    }

    /// Drop the special device set.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn invalidate_special(&self) -> Result<bool> {
        let key = self.namespace.special_key(DEVICE_MODULE, SPECIAL_SET);
        self.store.delete(&key).await
    }

    /// Drop every device entry except the special set.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails; some entries may already be gone.
    pub async fn invalidate_all(&self) -> Result<usize> {
        let special = self.namespace.special_key(DEVICE_MODULE, SPECIAL_SET);
        let deleted = self
            .delete_matching(&self.namespace.module_pattern(DEVICE_MODULE), Some(&special))
            .await?;
        tracing::info!(deleted, "Invalidated device cache");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::CoordinationError;
    use crate::memory::InMemoryCoordinationStore;
    use crate::store::{MessageStream, ScanPage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        devices: Mutex<Vec<Device>>,
        special: Vec<String>,
        reads: AtomicUsize,
    }

    impl CountingSource {
        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl DeviceSource for CountingSource {
        fn fetch_device<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<Device>> {
            Box::pin(async move {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(self.devices.lock().unwrap().iter().find(|d| d.id == id).cloned())
            })
        }

        fn fetch_devices<'a>(&'a self, query: &'a DeviceQuery) -> StoreFuture<'a, Vec<Device>> {
            Box::pin(async move {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(self
                    .devices
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|d| query.matches(d))
                    .cloned()
                    .collect())
            })
        }

        fn fetch_special_devices(&self) -> StoreFuture<'_, Vec<String>> {
            Box::pin(async move {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(self.special.clone())
            })
        }
    }

    fn device(id: &str, cluster: &str, status: DeviceStatus) -> Device {
        Device {
            id: id.to_string(),
            hostname: format!("{id}.example"),
            cluster: cluster.to_string(),
            rack: None,
            status,
        }
    }

    fn setup() -> (DeviceCache, Arc<CountingSource>, Arc<InMemoryCoordinationStore>) {
        let source = Arc::new(CountingSource {
            devices: Mutex::new(vec![
                device("d1", "c1", DeviceStatus::Online),
                device("d2", "c1", DeviceStatus::Offline),
                device("d3", "c2", DeviceStatus::Online),
            ]),
            special: vec!["d3".to_string()],
            reads: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryCoordinationStore::new());
        let cache = DeviceCache::new(
            store.clone(),
            source.clone(),
            KeyNamespace::new("opsorder", "v1"),
        )
        .with_scan_batch_size(2);
        (cache, source, store)
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (cache, source, store) = setup();

        let first = cache.get_device("d1").await.unwrap();
        let second = cache.get_device("d1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.reads(), 1);
        let ttl = store.ttl("opsorder:device:v1:item:d1").unwrap().unwrap();
        assert!(ttl > Duration::from_secs(23 * 60 * 60));
    }

    #[tokio::test]
    async fn unknown_device_is_not_cached() {
        let (cache, source, _) = setup();
        assert!(cache.get_device("nope").await.unwrap().is_none());
        assert!(cache.get_device("nope").await.unwrap().is_none());
        assert_eq!(source.reads(), 2);
    }

    #[tokio::test]
    async fn ttl_override_applies() {
        let (cache, _, store) = setup();
        let cache = cache.with_ttl(Duration::from_secs(60));
        cache.list_devices(&DeviceQuery::all()).await.unwrap();

        let ttl = store.ttl("opsorder:device:v1:list:all").unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn invalidation_clears_entity_list_and_field_entries() {
        let (cache, source, store) = setup();
        cache.get_device("d1").await.unwrap();
        cache.list_devices(&DeviceQuery::all().in_cluster("c1")).await.unwrap();
        cache.devices_by_field(DeviceField::Cluster, "c1").await.unwrap();
        cache.summary().await.unwrap();
        cache.special_devices().await.unwrap();
        let reads = source.reads();

        source.devices.lock().unwrap()[0].status = DeviceStatus::Maintenance;
        cache.invalidate_device("d1").await.unwrap();

        assert_eq!(cache.get_device("d1").await.unwrap().unwrap().status, DeviceStatus::Maintenance);
        let summary = cache.summary().await.unwrap();
        assert_eq!(summary.by_status.get(&DeviceStatus::Maintenance), Some(&1));
        assert!(source.reads() > reads);

        // Special set survives device invalidation.
        assert!(store.exists("opsorder:device:v1:special:set").await.unwrap());
    }

    #[tokio::test]
    async fn special_set_has_no_expiry_and_survives_invalidate_all() {
        let (cache, source, store) = setup();
        assert!(cache.is_special("d3").await.unwrap());
        assert!(!cache.is_special("d1").await.unwrap());
        assert_eq!(source.reads(), 1);
        assert_eq!(store.ttl("opsorder:device:v1:special:set").unwrap(), None);

        cache.get_device("d1").await.unwrap();
        cache.invalidate_all().await.unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(cache.invalidate_special().await.unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn field_lookup_filters_on_field() {
        let (cache, _, _) = setup();
        let online = cache.devices_by_field(DeviceField::Status, "online").await.unwrap();
        let ids: Vec<_> = online.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d3"]);
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_miss() {
        let (cache, source, store) = setup();
        store.set("opsorder:device:v1:item:d2", "not json", None).await;

        let device = cache.get_device("d2").await.unwrap().unwrap();
        assert_eq!(device.id, "d2");
        assert_eq!(source.reads(), 1);
    }

    /// Store that rejects every command, like a Redis that went away.
    struct DownStore;

    fn down<T>(op: &'static str, key: &str) -> Result<T> {
        Err(CoordinationError::command(op, key, "connection refused"))
    }

    impl CoordinationStore for DownStore {
        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
            Box::pin(async move { down("GET", key) })
        }

        fn try_set<'a>(&'a self, key: &'a str, _: &'a str, _: Option<Duration>) -> StoreFuture<'a, ()> {
            Box::pin(async move { down("SET", key) })
        }

        fn acquire_lock<'a>(&'a self, key: &'a str, _: &'a str, _: Duration) -> StoreFuture<'a, bool> {
            Box::pin(async move { down("SET", key) })
        }

        fn release_lock<'a>(&'a self, key: &'a str, _: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async move { down("EVALSHA", key) })
        }

        fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async move { down("EXISTS", key) })
        }

        fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async move { down("DEL", key) })
        }

        fn scan_page<'a>(&'a self, _: u64, pattern: &'a str, _: usize) -> StoreFuture<'a, ScanPage> {
            Box::pin(async move { down("SCAN", pattern) })
        }

        fn publish<'a>(&'a self, channel: &'a str, _: &'a str) -> StoreFuture<'a, usize> {
            Box::pin(async move { down("PUBLISH", channel) })
        }

        fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, MessageStream> {
            Box::pin(async move { down("SUBSCRIBE", channel) })
        }
    }

    #[tokio::test]
    async fn unreachable_store_falls_back_to_source() {
        let (_, source, _) = setup();
        let cache = DeviceCache::new(
            Arc::new(DownStore),
            source.clone(),
            KeyNamespace::new("opsorder", "v1"),
        );

        assert_eq!(cache.get_device("d1").await.unwrap().unwrap().id, "d1");
        assert_eq!(cache.get_device("d1").await.unwrap().unwrap().id, "d1");
        assert_eq!(cache.list_devices(&DeviceQuery::all()).await.unwrap().len(), 3);
        assert_eq!(cache.summary().await.unwrap().total, 3);
        assert!(cache.is_special("d3").await.unwrap());

        // Nothing could be cached, so every read reached the source.
        assert_eq!(source.reads(), 5);
    }

    #[tokio::test]
    async fn invalidation_reports_store_failures() {
        let (_, source, _) = setup();
        let cache = DeviceCache::new(
            Arc::new(DownStore),
            source,
            KeyNamespace::new("opsorder", "v1"),
        );

        let err = cache.invalidate_device("d1").await.unwrap_err();
        assert!(matches!(err, CoordinationError::CommandFailed { operation: "DEL", .. }));
    }

    #[test]
    fn query_identifiers_are_distinct() {
        let a = DeviceQuery::all().in_cluster("a&status=online");
        let b = DeviceQuery::all().in_cluster("a").with_status(DeviceStatus::Online);
        assert_ne!(a.cache_identifier(), b.cache_identifier());
        assert_eq!(DeviceQuery::all().cache_identifier(), "all");
    }
}
