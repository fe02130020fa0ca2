//! Timeout configuration for fabz-link operations.
//!
//! Centralizes the timeouts used for the WebSocket handshake, outbound
//! writes, keepalive pings and HTTP snapshot requests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout configuration for client operations.
///
/// In configuration files every field is given in milliseconds
/// (`connection_timeout = 10000`).
///
/// # Examples
///
/// ```rust
/// use fabz_link::LinkTimeouts;
/// use std::time::Duration;
///
/// let timeouts = LinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(5))
///     .keepalive_interval(Duration::ZERO)
///     .build();
/// assert_eq!(timeouts.http_timeout, LinkTimeouts::default().http_timeout);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTimeouts {
    /// Timeout for establishing the socket (TCP + TLS + WebSocket handshake).
    /// Default: 10 seconds
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,

    /// Timeout for writing one outbound frame.
    /// Default: 10 seconds
    #[serde(with = "duration_ms")]
    pub send_timeout: Duration,

    /// Timeout for one HTTP snapshot request.
    /// Default: 30 seconds
    #[serde(with = "duration_ms")]
    pub http_timeout: Duration,

    /// Idle time after which a keepalive Ping is sent.
    /// Set to 0 to disable keepalive pings.
    /// Default: 20 seconds
    #[serde(with = "duration_ms")]
    pub keepalive_interval: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(20),
        }
    }
}

impl LinkTimeouts {
    pub fn builder() -> LinkTimeoutsBuilder {
        LinkTimeoutsBuilder::new()
    }

    /// Short timeouts for localhost development and tests.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_secs(2),
            http_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(15),
        }
    }

    /// Returns true if the duration means "no timeout".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero()
    }
}

/// Builder for [`LinkTimeouts`].
#[derive(Debug, Clone)]
pub struct LinkTimeoutsBuilder {
    timeouts: LinkTimeouts,
}

impl LinkTimeoutsBuilder {
    pub fn new() -> Self {
        Self {
            timeouts: LinkTimeouts::default(),
        }
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.send_timeout = timeout;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.http_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.timeouts.keepalive_interval = interval;
        self
    }

    pub fn build(self) -> LinkTimeouts {
        self.timeouts
    }
}

impl Default for LinkTimeoutsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde helper storing a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
