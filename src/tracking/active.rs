//! Periodic refresh of the active-driver list.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::cache::TrackingCache;
use super::snapshot::ArcSnapshotSource;
use crate::error::{FabzLinkError, Result};
use crate::models::DriverTracking;

type RefreshReply = oneshot::Sender<Result<Vec<DriverTracking>>>;

/// Fetch the active drivers and reconcile each with the cache, so a live
/// update newer than the snapshot is what callers see.
pub(crate) async fn fetch_active(
    source: &ArcSnapshotSource,
    cache: &TrackingCache<DriverTracking>,
) -> Result<Vec<DriverTracking>> {
    let drivers = source.active_drivers().await?;
    Ok(drivers
        .into_iter()
        .map(|driver| cache.reconcile(driver))
        .collect())
}

/// Keeps the active-driver list fresh on a fixed interval.
///
/// The first fetch happens immediately. Failed refreshes are logged and the
/// previous list stays current. Dropping the poller stops it.
pub struct ActiveDriversPoller {
    latest_rx: watch::Receiver<Option<Vec<DriverTracking>>>,
    refresh_tx: mpsc::Sender<RefreshReply>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ActiveDriversPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveDriversPoller")
            .field("drivers", &self.latest_rx.borrow().as_ref().map(Vec::len))
            .finish()
    }
}

impl ActiveDriversPoller {
    pub(crate) fn spawn(
        source: ArcSnapshotSource,
        cache: Arc<TrackingCache<DriverTracking>>,
        interval: Duration,
    ) -> Self {
        let (latest_tx, latest_rx) = watch::channel(None);
        let (refresh_tx, mut refresh_rx) = mpsc::channel::<RefreshReply>(8);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let reply = tokio::select! {
                    _ = ticker.tick() => None,
                    request = refresh_rx.recv() => match request {
                        Some(reply) => Some(reply),
                        None => break,
                    },
                };

                let result = fetch_active(&source, &cache).await;
                match &result {
                    Ok(drivers) => {
                        log::debug!("[fabz-link] Active drivers refreshed ({})", drivers.len());
                        latest_tx.send_replace(Some(drivers.clone()));
                    },
                    Err(e) => log::warn!("[fabz-link] Active driver refresh failed: {}", e),
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                    // A manual refresh restarts the period.
                    ticker.reset();
                }
            }
        });

        Self {
            latest_rx,
            refresh_tx,
            task,
        }
    }

    /// Most recent successful fetch, if any has completed.
    pub fn latest(&self) -> Option<Vec<DriverTracking>> {
        self.latest_rx.borrow().clone()
    }

    /// Wait for the next successful refresh.
    pub async fn changed(&mut self) -> Result<Vec<DriverTracking>> {
        loop {
            self.latest_rx.changed().await.map_err(|_| stopped())?;
            if let Some(drivers) = self.latest_rx.borrow_and_update().clone() {
                return Ok(drivers);
            }
        }
    }

    /// Fetch now instead of waiting for the next tick.
    pub async fn refresh(&self) -> Result<Vec<DriverTracking>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.refresh_tx.send(reply_tx).await.map_err(|_| stopped())?;
        reply_rx.await.map_err(|_| stopped())?
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ActiveDriversPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn stopped() -> FabzLinkError {
    FabzLinkError::InternalError("active driver poller has stopped".to_string())
}
