//! Data models for the fabz-link client library.
//!
//! Defines the wire messages exchanged over the live socket and the
//! tracked entities returned by snapshots and live updates.

pub mod client_message;
pub mod connection_options;
pub mod connection_state;
pub mod driver_tracking;
pub mod route_tracking;
pub mod server_message;
pub mod topic;
pub mod track_event;
pub mod tracking_location;
pub mod tracking_options;
pub mod watch_options;

#[cfg(test)]
mod tests;

pub use client_message::ClientMessage;
pub use connection_options::ConnectionOptions;
pub use connection_state::ConnectionState;
pub use driver_tracking::{DriverStatus, DriverTracking};
pub use route_tracking::{RouteStatus, RouteTracking};
pub use server_message::ServerMessage;
pub use topic::{driver_topic, parse_topic, route_topic, TopicKind, CONTROL_TOPIC};
pub use track_event::TrackEvent;
pub use tracking_location::TrackingLocation;
pub use tracking_options::TrackingOptions;
pub use watch_options::WatchOptions;
