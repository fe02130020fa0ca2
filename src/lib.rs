//! # fabz-link: Live Tracking Client for Fabz Operations
//!
//! Real-time transport and live driver/route tracking for the Fabz
//! laundry and delivery platform.
//!
//! ## Features
//!
//! - **Managed WebSocket**: one background task owns the socket, with a
//!   constant-interval reconnect policy and an observable connection state
//! - **Topic Subscriptions**: a deduplicated subscription set that is replayed
//!   after every reconnect
//! - **Message Routing**: typed server messages dispatched per topic, with
//!   synchronous listener removal
//! - **Live Tracking**: snapshot reads merged with live updates, newest sample
//!   wins
//! - **Location Reporting**: throttled forwarding of the device's own position
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fabz_link::FabzLinkClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FabzLinkClient::builder()
//!         .base_url("https://ops.fabzclean.com")
//!         .build()?;
//!     client.connect().await?;
//!
//!     let tracking = client.tracking();
//!     let current = tracking.driver_snapshot("D1").await?;
//!     println!("D1 is at {:?}", current.last_location);
//!
//!     let _subscription = tracking
//!         .subscribe_to_driver("D1", |driver| {
//!             println!("D1 moved to {}, {}", driver.last_location.latitude, driver.last_location.longitude);
//!         })
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade with a `[fabz-link]` prefix and
//! never installs a logger itself.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event_handlers;
pub mod location;
pub mod models;
pub mod router;
pub mod subscription;
pub mod timeouts;
pub mod tracking;

// Re-export main types for convenience
pub use client::{FabzLinkClient, FabzLinkClientBuilder};
pub use config::LinkConfig;
pub use connection::{resolve_ws_url, ConnectionManager};
pub use error::{FabzLinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use location::{
    LocationError, LocationReporter, LocationSample, LocationSink, LocationSource, LocationWatch,
    SimulatedLocationSource,
};
pub use models::{
    driver_topic, route_topic, ClientMessage, ConnectionOptions, ConnectionState, DriverStatus,
    DriverTracking, RouteStatus, RouteTracking, ServerMessage, TrackEvent, TrackingLocation,
    TrackingOptions, WatchOptions,
};
pub use router::{DispatchOutcome, ListenerGuard, MessageRouter};
pub use subscription::{SubscriptionRegistry, Topics};
pub use timeouts::LinkTimeouts;
pub use tracking::{
    ActiveDriversPoller, HttpSnapshotClient, LiveTrackingService, SnapshotSource,
    TrackingSubscription,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
