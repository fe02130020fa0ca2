//! Subscription bookkeeping for the live socket.

pub mod registry;

pub use registry::{SubscriptionRegistry, Topics};
