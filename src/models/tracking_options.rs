use serde::{Deserialize, Serialize};

/// Options for the live tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingOptions {
    /// Refresh period of [`ActiveDriversPoller`](crate::ActiveDriversPoller).
    /// Default: 30000ms
    #[serde(default = "default_active_poll_interval_ms")]
    pub active_poll_interval_ms: u64,

    /// Upper bound on positions kept per route; the oldest are dropped first.
    /// Default: 500
    #[serde(default = "default_max_route_points")]
    pub max_route_points: usize,
}

fn default_active_poll_interval_ms() -> u64 {
    30_000
}

fn default_max_route_points() -> usize {
    500
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            active_poll_interval_ms: default_active_poll_interval_ms(),
            max_route_points: default_max_route_points(),
        }
    }
}

impl TrackingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.active_poll_interval_ms = interval_ms;
        self
    }

    pub fn with_max_route_points(mut self, max_points: usize) -> Self {
        self.max_route_points = max_points;
        self
    }
}
