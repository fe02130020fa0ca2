//! Error types for fabz-link.

use thiserror::Error;

use crate::models::ConnectionState;

/// Errors surfaced by explicit client calls (connect, send, snapshots,
/// location updates). Transport failures that happen in the background are
/// reported through [`EventHandlers`](crate::EventHandlers) instead.
#[derive(Error, Debug)]
pub enum FabzLinkError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Not connected (connection state: {0})")]
    NotConnected(ConnectionState),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Server error {status_code}: {message}")]
    ServerError { status_code: u16, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FabzLinkError {
    /// Returns true for the "not connected" outcome of `send`/`update_location`.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected(_))
    }
}

impl From<serde_json::Error> for FabzLinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for fabz-link operations.
pub type Result<T> = std::result::Result<T, FabzLinkError>;
