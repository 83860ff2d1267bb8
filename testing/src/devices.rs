//! In-memory device system of record.

use opsorder_coordination::device_cache::{Device, DeviceQuery, DeviceSource, DeviceStatus};
use opsorder_coordination::error::CoordinationError;
use opsorder_coordination::store::StoreFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// Device source backed by a vector, counting every read.
#[derive(Debug, Default)]
pub struct InMemoryDeviceSource {
    devices: RwLock<Vec<Device>>,
    special: RwLock<Vec<String>>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryDeviceSource {
    /// Create a source holding `devices`
    #[must_use]
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: RwLock::new(devices),
            ..Self::default()
        }
    }

    /// Insert or replace a device
    pub fn upsert(&self, device: Device) {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        match devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device,
            None => devices.push(device),
        }
    }

    /// Change a device's status, returning whether it exists
    pub fn set_status(&self, id: &str, status: DeviceStatus) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        devices
            .iter_mut()
            .find(|d| d.id == id)
            .map(|d| d.status = status)
            .is_some()
    }

    /// Replace the special device set
    pub fn set_special(&self, ids: Vec<String>) {
        *self.special.write().unwrap_or_else(PoisonError::into_inner) = ids;
    }

    /// Make every following read fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of reads served so far
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn begin_read(&self) -> Result<(), CoordinationError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoordinationError::Source("device inventory unavailable".into()));
        }
        Ok(())
    }
}

impl DeviceSource for InMemoryDeviceSource {
    fn fetch_device<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<Device>> {
        Box::pin(async move {
            self.begin_read()?;
            let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
            Ok(devices.iter().find(|d| d.id == id).cloned())
        })
    }

    fn fetch_devices<'a>(&'a self, query: &'a DeviceQuery) -> StoreFuture<'a, Vec<Device>> {
        Box::pin(async move {
            self.begin_read()?;
            let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
            Ok(devices.iter().filter(|d| query.matches(d)).cloned().collect())
        })
    }

    fn fetch_special_devices(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self.special.read().unwrap_or_else(PoisonError::into_inner).clone())
        })
    }
}
