use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FabzLinkError, Result};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single position sample for a driver or a route.
///
/// A newer sample always supersedes an older one for the same entity;
/// `timestamp` is what decides "newer".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// When the position was observed (ISO-8601 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    /// Ground speed in m/s, if the source reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Heading in degrees clockwise from true north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl TrackingLocation {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy,
            speed: None,
            heading: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Reject coordinates that cannot be real positions.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FabzLinkError::InvalidLocation(format!(
                "latitude {} out of range [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FabzLinkError::InvalidLocation(format!(
                "longitude {} out of range [-180, 180]",
                self.longitude
            )));
        }
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(FabzLinkError::InvalidLocation(format!(
                "accuracy {} must be a non-negative number",
                self.accuracy
            )));
        }
        for (name, value) in [("speed", self.speed), ("heading", self.heading)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(FabzLinkError::InvalidLocation(format!(
                        "{} must be finite",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_m(&self, other: &TrackingLocation) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}
