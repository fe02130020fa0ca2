//! Forwards the device's own position to the tracking backend.
//!
//! [`LocationReporter::start`] starts the [`LocationSource`] and a
//! forwarding task, and returns a [`LocationWatch`] that stops both when it
//! is dropped. Samples go through a throttle, are converted to
//! [`TrackingLocation`], validated and handed to a [`LocationSink`].

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::source::{LocationSample, LocationSource, SampleCallback};
use crate::error::{FabzLinkError, Result};
use crate::models::{TrackingLocation, WatchOptions};

/// Pending samples between the source callback and the forwarding task.
const SAMPLE_BUFFER: usize = 64;

/// Where accepted samples are delivered.
#[async_trait]
pub trait LocationSink: Send + Sync + 'static {
    async fn publish_location(&self, driver_id: &str, location: TrackingLocation) -> Result<()>;
}

/// Decides which samples are worth forwarding.
#[derive(Debug, Clone)]
pub(crate) struct Throttle {
    min_interval: ChronoDuration,
    min_distance_m: f64,
    last: Option<TrackingLocation>,
}

impl Throttle {
    pub(crate) fn new(options: &WatchOptions) -> Self {
        Self {
            min_interval: ChronoDuration::milliseconds(
                i64::try_from(options.min_interval_ms).unwrap_or(i64::MAX),
            ),
            min_distance_m: options.min_distance_m,
            last: None,
        }
    }

    /// True if `location` should be forwarded; it then becomes the reference
    /// for the next decision.
    pub(crate) fn accept(&mut self, location: &TrackingLocation) -> bool {
        let accepted = match &self.last {
            None => true,
            Some(last) => {
                location.timestamp - last.timestamp >= self.min_interval
                    || (self.min_distance_m > 0.0
                        && location.distance_m(last) > self.min_distance_m)
            },
        };
        if accepted {
            self.last = Some(location.clone());
        }
        accepted
    }
}

/// Counters of a running watch.
#[derive(Debug, Default)]
pub struct WatchStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl WatchStats {
    /// Fixes delivered by the source, including fix errors.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Samples the sink accepted.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Samples dropped by the throttle or as too old.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Fix errors, invalid samples and sink failures.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Reports the device's position on behalf of one driver.
pub struct LocationReporter {
    source: Arc<dyn LocationSource>,
    sink: Arc<dyn LocationSink>,
    options: WatchOptions,
}

impl LocationReporter {
    pub fn new(
        source: Arc<dyn LocationSource>,
        sink: Arc<dyn LocationSink>,
        options: WatchOptions,
    ) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Start watching and forwarding positions for `driver_id`.
    ///
    /// Must be called inside a Tokio runtime. The returned guard stops the
    /// watch when dropped.
    pub fn start(&self, driver_id: impl Into<String>) -> Result<LocationWatch> {
        let driver_id = driver_id.into();
        if driver_id.trim().is_empty() {
            return Err(FabzLinkError::ConfigurationError(
                "driver_id must not be empty".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            FabzLinkError::ConfigurationError(
                "LocationReporter must be started inside a Tokio runtime".to_string(),
            )
        })?;

        let stats = Arc::new(WatchStats::default());
        let (sample_tx, sample_rx) = mpsc::channel::<LocationSample>(SAMPLE_BUFFER);

        let callback_stats = Arc::clone(&stats);
        let callback_driver = driver_id.clone();
        let callback: SampleCallback = Arc::new(move |step| {
            callback_stats.received.fetch_add(1, Ordering::Relaxed);
            match step {
                Ok(sample) => {
                    if sample_tx.try_send(sample).is_err() {
                        callback_stats.skipped.fetch_add(1, Ordering::Relaxed);
                        log::debug!(
                            "[fabz-link] Sample buffer full for driver {}, dropping fix",
                            callback_driver
                        );
                    }
                },
                Err(e) => {
                    callback_stats.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("[fabz-link] Location watch error for driver {}: {}", callback_driver, e);
                },
            }
        });

        let task = runtime.spawn(forward_samples(
            driver_id.clone(),
            sample_rx,
            Arc::clone(&self.sink),
            self.options.clone(),
            Arc::clone(&stats),
        ));

        if let Err(e) = self.source.start(&self.options, callback) {
            task.abort();
            return Err(e);
        }
        log::info!("[fabz-link] Location watch started for driver {}", driver_id);

        Ok(LocationWatch {
            driver_id,
            source: Arc::clone(&self.source),
            task: Some(task),
            stats,
        })
    }
}

async fn forward_samples(
    driver_id: String,
    mut sample_rx: mpsc::Receiver<LocationSample>,
    sink: Arc<dyn LocationSink>,
    options: WatchOptions,
    stats: Arc<WatchStats>,
) {
    let mut throttle = Throttle::new(&options);
    let max_age = ChronoDuration::milliseconds(
        i64::try_from(options.maximum_age_ms).unwrap_or(i64::MAX),
    );

    while let Some(sample) = sample_rx.recv().await {
        let location = TrackingLocation::from(sample);

        if options.maximum_age_ms > 0 && Utc::now() - location.timestamp > max_age {
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "[fabz-link] Dropping fix older than {}ms for driver {}",
                options.maximum_age_ms,
                driver_id
            );
            continue;
        }
        if let Err(e) = location.validate() {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!("[fabz-link] Dropping invalid fix for driver {}: {}", driver_id, e);
            continue;
        }
        if !throttle.accept(&location) {
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        match sink.publish_location(&driver_id, location).await {
            Ok(()) => {
                stats.forwarded.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("[fabz-link] Failed to report location for driver {}: {}", driver_id, e);
            },
        }
    }
}

/// A running location watch. Dropping it stops the source and the
/// forwarding task.
pub struct LocationWatch {
    driver_id: String,
    source: Arc<dyn LocationSource>,
    task: Option<JoinHandle<()>>,
    stats: Arc<WatchStats>,
}

impl std::fmt::Debug for LocationWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationWatch")
            .field("driver_id", &self.driver_id)
            .field("active", &self.is_active())
            .field("stats", &self.stats)
            .finish()
    }
}

impl LocationWatch {
    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn stats(&self) -> &WatchStats {
        &self.stats
    }

    /// Stop watching. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.source.stop();
            task.abort();
            log::info!("[fabz-link] Location watch stopped for driver {}", self.driver_id);
        }
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        self.stop();
    }
}
