use serde::{Deserialize, Serialize};

/// Options for watching the device position.
///
/// The first three are passed to the [`LocationSource`](crate::LocationSource);
/// the last two drive the reporter's throttle: a sample is forwarded if it
/// is the first one, if `min_interval_ms` has passed since the last forwarded
/// sample, or if it moved more than `min_distance_m` (when non-zero).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Ask the platform for its most accurate fix.
    /// Default: true
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,

    /// Oldest acceptable sample age. Older samples are dropped. 0 disables
    /// the check.
    /// Default: 10000ms
    #[serde(default = "default_maximum_age_ms")]
    pub maximum_age_ms: u64,

    /// How long the platform may take to produce one fix.
    /// Default: 15000ms
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between forwarded samples, by sample timestamp.
    /// Default: 5000ms
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Movement that bypasses `min_interval_ms`. 0 disables it.
    /// Default: 0
    #[serde(default)]
    pub min_distance_m: f64,
}

fn default_high_accuracy() -> bool {
    true
}

fn default_maximum_age_ms() -> u64 {
    10_000
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_min_interval_ms() -> u64 {
    5_000
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: default_high_accuracy(),
            maximum_age_ms: default_maximum_age_ms(),
            timeout_ms: default_timeout_ms(),
            min_interval_ms: default_min_interval_ms(),
            min_distance_m: 0.0,
        }
    }
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_high_accuracy(mut self, enabled: bool) -> Self {
        self.high_accuracy = enabled;
        self
    }

    pub fn with_maximum_age_ms(mut self, maximum_age_ms: u64) -> Self {
        self.maximum_age_ms = maximum_age_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_min_interval_ms(mut self, min_interval_ms: u64) -> Self {
        self.min_interval_ms = min_interval_ms;
        self
    }

    pub fn with_min_distance_m(mut self, min_distance_m: f64) -> Self {
        self.min_distance_m = min_distance_m;
        self
    }
}
