//! Session-level client with builder pattern.
//!
//! [`FabzLinkClient`] is the lifecycle root: it owns the connection manager
//! and the tracking service for one session. Create it at session start and
//! call [`shutdown`](FabzLinkClient::shutdown) (or drop it) at session end.

use std::sync::Arc;

use crate::config::LinkConfig;
use crate::connection::ConnectionManager;
use crate::error::{FabzLinkError, Result};
use crate::event_handlers::EventHandlers;
use crate::location::{LocationReporter, LocationSource};
use crate::models::{ConnectionOptions, ConnectionState, TrackingOptions, WatchOptions};
use crate::timeouts::LinkTimeouts;
use crate::tracking::{ArcSnapshotSource, HttpSnapshotClient, LiveTrackingService};

/// Main fabz-link client.
///
/// # Examples
///
/// ```rust,no_run
/// use fabz_link::FabzLinkClient;
///
/// # async fn example() -> fabz_link::Result<()> {
/// let client = FabzLinkClient::builder()
///     .base_url("https://ops.fabzclean.com")
///     .build()?;
///
/// client.connect().await?;
/// let _sub = client
///     .tracking()
///     .subscribe_to_driver("D1", |driver| println!("{:?}", driver.last_location))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct FabzLinkClient {
    config: LinkConfig,
    connection: Arc<ConnectionManager>,
    tracking: Arc<LiveTrackingService>,
}

impl std::fmt::Debug for FabzLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabzLinkClient")
            .field("base_url", &self.config.base_url)
            .field("connection", &self.connection)
            .finish()
    }
}

impl FabzLinkClient {
    pub fn builder() -> FabzLinkClientBuilder {
        FabzLinkClientBuilder::new()
    }

    /// Build a client straight from a validated [`LinkConfig`].
    pub fn from_config(config: LinkConfig) -> Result<Self> {
        FabzLinkClientBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn tracking(&self) -> &Arc<LiveTrackingService> {
        &self.tracking
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    /// A reporter that forwards fixes from `source` through the tracking
    /// service, using the configured watch options.
    pub fn location_reporter(&self, source: Arc<dyn LocationSource>) -> LocationReporter {
        LocationReporter::new(
            source,
            Arc::clone(&self.tracking) as Arc<dyn crate::location::LocationSink>,
            self.config.watch.clone(),
        )
    }

    /// Close the socket and release the session.
    pub async fn shutdown(self) {
        if let Err(e) = self.connection.disconnect().await {
            log::debug!("[fabz-link] Disconnect during shutdown failed: {}", e);
        }
    }
}

/// Builder for configuring [`FabzLinkClient`] instances.
pub struct FabzLinkClientBuilder {
    config: LinkConfig,
    base_url_set: bool,
    handlers: EventHandlers,
    snapshots: Option<ArcSnapshotSource>,
}

impl FabzLinkClientBuilder {
    fn new() -> Self {
        Self {
            config: LinkConfig::default(),
            base_url_set: false,
            handlers: EventHandlers::new(),
            snapshots: None,
        }
    }

    /// Start from a complete configuration. Later setters override it.
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self.base_url_set = true;
        self
    }

    /// Set the backend origin (`http(s)://host[:port]`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self.base_url_set = true;
        self
    }

    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.config.connection = options;
        self
    }

    pub fn timeouts(mut self, timeouts: LinkTimeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn tracking_options(mut self, options: TrackingOptions) -> Self {
        self.config.tracking = options;
        self
    }

    pub fn watch_options(mut self, options: WatchOptions) -> Self {
        self.config.watch = options;
        self
    }

    /// Connection lifecycle callbacks (`on_open`, `on_close`, ...).
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace the HTTP snapshot client, e.g. with a fixture source.
    pub fn snapshot_source(mut self, source: ArcSnapshotSource) -> Self {
        self.snapshots = Some(source);
        self
    }

    /// Build the client. Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<FabzLinkClient> {
        if !self.base_url_set {
            return Err(FabzLinkError::ConfigurationError(
                "base_url is required".to_string(),
            ));
        }
        self.config.validate()?;

        let snapshots = match self.snapshots {
            Some(source) => source,
            None => Arc::new(HttpSnapshotClient::new(
                self.config.base_url.clone(),
                &self.config.timeouts,
            )?),
        };

        let connection = Arc::new(ConnectionManager::new(
            &self.config.base_url,
            self.config.connection.clone(),
            self.config.timeouts.clone(),
            self.handlers,
        )?);
        let tracking = Arc::new(LiveTrackingService::new(
            Arc::clone(&connection),
            snapshots,
            self.config.tracking.clone(),
        ));

        Ok(FabzLinkClient {
            config: self.config,
            connection,
            tracking,
        })
    }
}
