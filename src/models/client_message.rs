use serde::{Deserialize, Serialize};

use super::tracking_location::TrackingLocation;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Replace the server-side subscription set with `topics`.
    ///
    /// Always carries the full set, never a delta.
    Subscribe {
        topics: Vec<String>,
    },

    /// Drop every subscription held by this connection.
    Unsubscribe,

    /// Position report from a device that is itself the driver.
    LocationUpdate {
        driver_id: String,
        location: TrackingLocation,
    },
}

impl ClientMessage {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::LocationUpdate { .. } => "location_update",
        }
    }

    /// True for subscription control frames.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Subscribe { .. } | Self::Unsubscribe)
    }
}
