//! Device location reporting.
//!
//! A [`LocationSource`] produces fixes; a [`LocationReporter`] throttles
//! them and forwards them to a [`LocationSink`] (normally the
//! [`LiveTrackingService`](crate::LiveTrackingService)) for as long as the
//! returned [`LocationWatch`] is alive.

pub mod adapter;
pub mod simulated;
pub mod source;

pub use adapter::{LocationReporter, LocationSink, LocationWatch, WatchStats};
pub use simulated::SimulatedLocationSource;
pub use source::{LocationError, LocationSample, LocationSource, SampleCallback};
