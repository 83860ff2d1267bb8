//! Payload shapes for the built-in order types.
//!
//! The set of shapes is closed: [`AnyPayload`] is the tagged sum used at the dispatch
//! boundary, and every match over it is exhaustive. Adding a shape means adding a
//! variant here and a matching [`RegisteredService`] variant.

use crate::error::{OrderError, Result};
use crate::registry::RegisteredService;
use crate::service::OrderService;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Discriminant of a payload shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// [`GeneralPayload`]
    General,
    /// [`ElasticScalingPayload`]
    ElasticScaling,
    /// [`MaintenancePayload`]
    Maintenance,
}

impl PayloadKind {
    /// Kebab-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::ElasticScaling => "elastic-scaling",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour every payload shape provides to the generic order machinery.
pub trait OrderPayload:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Which shape this is
    const KIND: PayloadKind;

    /// Reject malformed payloads before anything is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Validation`] describing the first problem found.
    fn validate(&self) -> Result<()>;

    /// Devices whose cached state may change when this order moves.
    fn affected_devices(&self) -> Vec<String>;

    /// Wrap into the tagged sum.
    fn into_any(self) -> AnyPayload;

    /// Unwrap from the tagged sum, handing the value back on a shape mismatch.
    ///
    /// # Errors
    ///
    /// Returns the original payload if it holds a different shape.
    fn from_any(any: AnyPayload) -> std::result::Result<Self, AnyPayload>;

    /// Capability check: the service bound in `registered`, if it serves this shape.
    fn bound_service(
        registered: &RegisteredService,
    ) -> Option<Arc<dyn OrderService<Payload = Self>>>;

    /// Wrap a service for this shape into its registry variant.
    fn wrap_service(service: Arc<dyn OrderService<Payload = Self>>) -> RegisteredService;
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OrderError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_device_ids(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        require_non_blank("device id", id)?;
        if !seen.insert(id.as_str()) {
            return Err(OrderError::validation(format!("duplicate device id '{id}'")));
        }
    }
    Ok(())
}

/// General operational request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralPayload {
    /// Short summary
    pub title: String,
    /// Free-form details
    #[serde(default)]
    pub description: String,
    /// Devices the request concerns, if any
    #[serde(default)]
    pub device_ids: Vec<String>,
}

/// Maximum title length for general orders.
pub const MAX_TITLE_LEN: usize = 200;

impl OrderPayload for GeneralPayload {
    const KIND: PayloadKind = PayloadKind::General;

    fn validate(&self) -> Result<()> {
        require_non_blank("title", &self.title)?;
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(OrderError::validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        validate_device_ids(&self.device_ids)
    }

    fn affected_devices(&self) -> Vec<String> {
        self.device_ids.clone()
    }

    fn into_any(self) -> AnyPayload {
        AnyPayload::General(self)
    }

    fn from_any(any: AnyPayload) -> std::result::Result<Self, AnyPayload> {
        match any {
            AnyPayload::General(payload) => Ok(payload),
            other @ (AnyPayload::ElasticScaling(_) | AnyPayload::Maintenance(_)) => Err(other),
        }
    }

    fn wrap_service(service: Arc<dyn OrderService<Payload = Self>>) -> RegisteredService {
        RegisteredService::General(service)
    }

    fn bound_service(
        registered: &RegisteredService,
    ) -> Option<Arc<dyn OrderService<Payload = Self>>> {
        match registered {
            RegisteredService::General(service) => Some(Arc::clone(service)),
            RegisteredService::ElasticScaling(_) | RegisteredService::Maintenance(_) => None,
        }
    }
}

/// Direction of an elastic scaling request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingDirection {
    /// Add capacity to the cluster
    ScaleOut,
    /// Release capacity from the cluster
    ScaleIn,
}

/// Request to grow or shrink a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticScalingPayload {
    /// Target cluster
    pub cluster: String,
    /// Grow or shrink
    pub direction: ScalingDirection,
    /// Number of instances to add or release
    pub instance_count: u32,
    /// Devices being released (scale-in) or pre-assigned (scale-out)
    #[serde(default)]
    pub device_ids: Vec<String>,
}

impl OrderPayload for ElasticScalingPayload {
    const KIND: PayloadKind = PayloadKind::ElasticScaling;

    fn validate(&self) -> Result<()> {
        require_non_blank("cluster", &self.cluster)?;
        if self.instance_count == 0 {
            return Err(OrderError::validation("instance_count must be positive"));
        }
        validate_device_ids(&self.device_ids)?;
        if self.direction == ScalingDirection::ScaleIn
            && self.device_ids.len() != self.instance_count as usize
        {
            return Err(OrderError::validation(
                "scale-in must name exactly instance_count devices",
            ));
        }
        Ok(())
    }

    fn affected_devices(&self) -> Vec<String> {
        self.device_ids.clone()
    }

    fn into_any(self) -> AnyPayload {
        AnyPayload::ElasticScaling(self)
    }

    fn from_any(any: AnyPayload) -> std::result::Result<Self, AnyPayload> {
        match any {
            AnyPayload::ElasticScaling(payload) => Ok(payload),
            other @ (AnyPayload::General(_) | AnyPayload::Maintenance(_)) => Err(other),
        }
    }

    fn wrap_service(service: Arc<dyn OrderService<Payload = Self>>) -> RegisteredService {
        RegisteredService::ElasticScaling(service)
    }

    fn bound_service(
        registered: &RegisteredService,
    ) -> Option<Arc<dyn OrderService<Payload = Self>>> {
        match registered {
            RegisteredService::ElasticScaling(service) => Some(Arc::clone(service)),
            RegisteredService::General(_) | RegisteredService::Maintenance(_) => None,
        }
    }
}

/// Kind of maintenance work.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenanceKind {
    /// Fix a broken component
    Repair,
    /// Firmware or hardware upgrade
    Upgrade,
    /// Routine check
    Inspection,
    /// Swap the device out
    Replacement,
}

/// Device maintenance request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenancePayload {
    /// Devices taken out for maintenance
    pub device_ids: Vec<String>,
    /// What is being done
    pub kind: MaintenanceKind,
    /// Start of the maintenance window
    pub window_start: DateTime<Utc>,
    /// End of the maintenance window
    pub window_end: DateTime<Utc>,
    /// Free-form details
    #[serde(default)]
    pub description: String,
}

impl OrderPayload for MaintenancePayload {
    const KIND: PayloadKind = PayloadKind::Maintenance;

    fn validate(&self) -> Result<()> {
        if self.device_ids.is_empty() {
            return Err(OrderError::validation(
                "maintenance needs at least one device",
            ));
        }
        validate_device_ids(&self.device_ids)?;
        if self.window_end <= self.window_start {
            return Err(OrderError::validation(
                "maintenance window must end after it starts",
            ));
        }
        Ok(())
    }

    fn affected_devices(&self) -> Vec<String> {
        self.device_ids.clone()
    }

    fn into_any(self) -> AnyPayload {
        AnyPayload::Maintenance(self)
    }

    fn from_any(any: AnyPayload) -> std::result::Result<Self, AnyPayload> {
        match any {
            AnyPayload::Maintenance(payload) => Ok(payload),
            other @ (AnyPayload::General(_) | AnyPayload::ElasticScaling(_)) => Err(other),
        }
    }

    fn wrap_service(service: Arc<dyn OrderService<Payload = Self>>) -> RegisteredService {
        RegisteredService::Maintenance(service)
    }

    fn bound_service(
        registered: &RegisteredService,
    ) -> Option<Arc<dyn OrderService<Payload = Self>>> {
        match registered {
            RegisteredService::Maintenance(service) => Some(Arc::clone(service)),
            RegisteredService::General(_) | RegisteredService::ElasticScaling(_) => None,
        }
    }
}

/// Tagged sum over every payload shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum AnyPayload {
    /// General operational request
    General(GeneralPayload),
    /// Elastic scaling request
    ElasticScaling(ElasticScalingPayload),
    /// Device maintenance request
    Maintenance(MaintenancePayload),
}

impl AnyPayload {
    /// Shape held by this payload
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::General(_) => PayloadKind::General,
            Self::ElasticScaling(_) => PayloadKind::ElasticScaling,
            Self::Maintenance(_) => PayloadKind::Maintenance,
        }
    }

    /// Devices whose cached state may change
    #[must_use]
    pub fn affected_devices(&self) -> Vec<String> {
        match self {
            Self::General(p) => p.affected_devices(),
            Self::ElasticScaling(p) => p.affected_devices(),
            Self::Maintenance(p) => p.affected_devices(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;

    fn maintenance(start_offset_hours: i64, end_offset_hours: i64) -> MaintenancePayload {
        let base = Utc::now();
        MaintenancePayload {
            device_ids: vec!["dev-1".into()],
            kind: MaintenanceKind::Repair,
            window_start: base + Duration::hours(start_offset_hours),
            window_end: base + Duration::hours(end_offset_hours),
            description: String::new(),
        }
    }

    #[test]
    fn general_requires_title() {
        let payload = GeneralPayload {
            title: "  ".into(),
            description: String::new(),
            device_ids: vec![],
        };
        assert!(matches!(payload.validate(), Err(OrderError::Validation(_))));
    }

    #[test]
    fn duplicate_devices_are_rejected() {
        let payload = GeneralPayload {
            title: "reboot".into(),
            description: String::new(),
            device_ids: vec!["a".into(), "a".into()],
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn scale_in_must_name_every_released_device() {
        let mut payload = ElasticScalingPayload {
            cluster: "c1".into(),
            direction: ScalingDirection::ScaleIn,
            instance_count: 2,
            device_ids: vec!["a".into()],
        };
        assert!(payload.validate().is_err());

        payload.device_ids.push("b".into());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn scale_out_needs_positive_count() {
        let payload = ElasticScalingPayload {
            cluster: "c1".into(),
            direction: ScalingDirection::ScaleOut,
            instance_count: 0,
            device_ids: vec![],
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn maintenance_window_must_be_ordered() {
        assert!(maintenance(0, 2).validate().is_ok());
        assert!(maintenance(2, 2).validate().is_err());
        assert!(maintenance(3, 1).validate().is_err());
    }

    #[test]
    fn from_any_returns_mismatched_payload() {
        let any = maintenance(0, 1).into_any();
        let back = GeneralPayload::from_any(any.clone()).unwrap_err();
        assert_eq!(back, any);
        assert!(MaintenancePayload::from_any(any).is_ok());
    }

    #[test]
    fn any_payload_is_tagged_on_the_wire() {
        let any = GeneralPayload {
            title: "t".into(),
            description: String::new(),
            device_ids: vec![],
        }
        .into_any();
        let json = serde_json::to_value(&any).unwrap();
        assert_eq!(json["kind"], "general");
        assert_eq!(json["data"]["title"], "t");
    }
}
