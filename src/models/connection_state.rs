use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket and no pending reconnection.
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// The socket is open.
    Connected,
    /// The socket was lost; a reconnection attempt is scheduled.
    Reconnecting,
    /// Retries are exhausted or the endpoint rejected us. Only an explicit
    /// `connect()` leaves this state.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True while the manager will keep trying without being told to.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
