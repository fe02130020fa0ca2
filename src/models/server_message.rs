use serde::{Deserialize, Serialize};

use super::driver_tracking::DriverStatus;
use super::route_tracking::RouteStatus;
use super::topic::{driver_topic, route_topic, CONTROL_TOPIC};
use super::tracking_location::TrackingLocation;

/// Server-to-client messages, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// New position (and optionally status) for a driver.
    DriverUpdate {
        driver_id: String,
        location: TrackingLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<DriverStatus>,
    },

    /// New position (and optionally status) on a route.
    RouteUpdate {
        route_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        driver_id: Option<String>,
        position: TrackingLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<RouteStatus>,
    },

    /// Server confirmation of the subscription set it now holds.
    Ack {
        #[serde(default)]
        topics: Vec<String>,
    },
}

impl ServerMessage {
    /// Topic this message is routed on.
    pub fn topic(&self) -> String {
        match self {
            Self::DriverUpdate { driver_id, .. } => driver_topic(driver_id),
            Self::RouteUpdate { route_id, .. } => route_topic(route_id),
            Self::Ack { .. } => CONTROL_TOPIC.to_string(),
        }
    }
}
