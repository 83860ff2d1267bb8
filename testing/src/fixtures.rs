//! Ready-made payloads and devices.

use crate::mocks::test_epoch;
use chrono::Duration;
use opsorder_coordination::device_cache::{Device, DeviceStatus};
use opsorder_core::payload::{
    ElasticScalingPayload, GeneralPayload, MaintenanceKind, MaintenancePayload, ScalingDirection,
};

/// A general order touching `dev-1`
#[must_use]
pub fn general_payload() -> GeneralPayload {
    GeneralPayload {
        title: "Rotate TLS certificates".to_string(),
        description: "Yearly rotation on the edge fleet".to_string(),
        device_ids: vec!["dev-1".to_string()],
    }
}

/// Scale `cluster-a` out by two instances
#[must_use]
pub fn scale_out_payload() -> ElasticScalingPayload {
    ElasticScalingPayload {
        cluster: "cluster-a".to_string(),
        direction: ScalingDirection::ScaleOut,
        instance_count: 2,
        device_ids: Vec::new(),
    }
}

/// Scale `cluster-a` in by releasing the given devices
#[must_use]
pub fn scale_in_payload(device_ids: &[&str]) -> ElasticScalingPayload {
    ElasticScalingPayload {
        cluster: "cluster-a".to_string(),
        direction: ScalingDirection::ScaleIn,
        instance_count: u32::try_from(device_ids.len()).unwrap_or(u32::MAX),
        device_ids: device_ids.iter().map(ToString::to_string).collect(),
    }
}

/// A two-hour repair window on the given devices, starting at the test epoch
#[must_use]
pub fn maintenance_payload(device_ids: &[&str]) -> MaintenancePayload {
    MaintenancePayload {
        device_ids: device_ids.iter().map(ToString::to_string).collect(),
        kind: MaintenanceKind::Repair,
        window_start: test_epoch(),
        window_end: test_epoch() + Duration::hours(2),
        description: "Replace failed PSU".to_string(),
    }
}

/// An online device in `cluster`
#[must_use]
pub fn device(id: &str, cluster: &str) -> Device {
    Device {
        id: id.to_string(),
        hostname: format!("{id}.{cluster}.internal"),
        cluster: cluster.to_string(),
        rack: None,
        status: DeviceStatus::Online,
    }
}

/// Three online devices: `dev-1` and `dev-2` in `cluster-a`, `dev-3` in `cluster-b`
#[must_use]
pub fn fleet() -> Vec<Device> {
    vec![
        device("dev-1", "cluster-a"),
        device("dev-2", "cluster-a"),
        device("dev-3", "cluster-b"),
    ]
}
