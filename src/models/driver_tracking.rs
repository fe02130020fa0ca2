use serde::{Deserialize, Serialize};

use super::tracking_location::TrackingLocation;

/// Availability of a driver as reported by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    #[default]
    Available,
    OnRoute,
    Busy,
    Offline,
}

/// Best-known state of one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverTracking {
    /// Stable identity of the driver.
    pub driver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: DriverStatus,
    /// Order the driver is currently working, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub last_location: TrackingLocation,
}

impl DriverTracking {
    pub fn new(driver_id: impl Into<String>, last_location: TrackingLocation) -> Self {
        Self {
            driver_id: driver_id.into(),
            name: None,
            status: DriverStatus::default(),
            order_id: None,
            last_location,
        }
    }

    pub fn with_status(mut self, status: DriverStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
