use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tracking_location::TrackingLocation;

/// Progress of a delivery/pickup route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

/// Best-known state of one route: the ordered trail of positions reported
/// by the driver working it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTracking {
    pub route_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub status: RouteStatus,
    /// Positions in ascending timestamp order.
    #[serde(default)]
    pub positions: Vec<TrackingLocation>,
    /// Timestamp of the newest information folded into this route.
    pub updated_at: DateTime<Utc>,
}

impl RouteTracking {
    pub fn new(route_id: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            route_id: route_id.into(),
            driver_id: None,
            status: RouteStatus::default(),
            positions: Vec::new(),
            updated_at,
        }
    }

    /// Most recent position on the route, if any.
    pub fn current_position(&self) -> Option<&TrackingLocation> {
        self.positions.last()
    }
}
