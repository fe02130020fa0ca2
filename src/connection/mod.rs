//! Live socket management.
//!
//! This module contains:
//! - [`endpoint`]: base URL → `ws://` / `wss://` resolution
//! - [`websocket`]: low-level helpers (dialing, frame codec, reader task)
//! - [`manager`]: the [`ConnectionManager`] handle and its background task

pub mod endpoint;
pub mod manager;
pub(crate) mod websocket;

pub use endpoint::{base_url_for, is_secure_ws_url, resolve_ws_url};
pub use manager::ConnectionManager;

/// Capacity of the command channel between handles and the connection task.
pub(crate) const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the channel carrying frames from reader tasks.
pub(crate) const INBOUND_CHANNEL_CAPACITY: usize = 1024;

/// Largest inbound frame accepted (1 MiB). Tracking payloads are tiny.
pub(crate) const MAX_TEXT_FRAME_BYTES: usize = 1 << 20;

/// A duration far enough in the future (~100 years) to act as "never" for
/// deadline calculations without overflowing `Instant::now() + dur`.
pub(crate) const FAR_FUTURE: std::time::Duration =
    std::time::Duration::from_secs(100 * 365 * 24 * 3600);
