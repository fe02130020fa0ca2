//! Live tracking of drivers and routes.
//!
//! - [`cache`]: per-entity state with timestamp-guarded merging
//! - [`snapshot`]: one-shot HTTP reads that prime the caches
//! - [`service`]: [`LiveTrackingService`], which combines both with live
//!   updates from the connection manager
//! - [`active`]: [`ActiveDriversPoller`], a periodic active-driver refresh

pub mod active;
pub mod cache;
pub mod service;
pub mod snapshot;

pub use active::ActiveDriversPoller;
pub use cache::{MergeOutcome, TrackedEntity, TrackingCache};
pub use service::{LiveTrackingService, TrackingSubscription};
pub use snapshot::{ArcSnapshotSource, HttpSnapshotClient, SnapshotSource};
