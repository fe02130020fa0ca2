//! The position-watching capability and the samples it produces.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{TrackingLocation, WatchOptions};

/// One fix reported by a [`LocationSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            speed: None,
            heading: None,
            timestamp,
        }
    }
}

impl From<LocationSample> for TrackingLocation {
    fn from(sample: LocationSample) -> Self {
        TrackingLocation {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.timestamp,
            accuracy: sample.accuracy,
            speed: sample.speed,
            heading: sample.heading,
        }
    }
}

/// Failure reported by a [`LocationSource`] for one fix. The watch goes on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Timed out waiting for a position fix")]
    Timeout,
}

/// Receives every fix or fix error from a running source.
pub type SampleCallback =
    Arc<dyn Fn(std::result::Result<LocationSample, LocationError>) + Send + Sync>;

/// A continuous position watcher (device GPS, a simulator, a replay file).
///
/// `start` begins delivering samples to `callback` at whatever cadence the
/// platform chooses; `stop` ends the watch. Stopping a source that is not
/// running is a no-op.
pub trait LocationSource: Send + Sync + 'static {
    fn start(&self, options: &WatchOptions, callback: SampleCallback) -> Result<()>;

    fn stop(&self);
}
