//! The live tracking service: snapshots plus live updates, merged per entity.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::active::{fetch_active, ActiveDriversPoller};
use super::cache::TrackingCache;
use super::snapshot::ArcSnapshotSource;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::location::LocationSink;
use crate::models::{
    driver_topic, route_topic, ClientMessage, DriverStatus, DriverTracking, RouteStatus,
    RouteTracking, ServerMessage, TrackEvent, TrackingLocation, TrackingOptions,
};
use crate::router::ListenerGuard;

/// Tracks drivers and routes for one client session.
///
/// Snapshot reads go through the [`SnapshotSource`](super::SnapshotSource);
/// live updates arrive through the [`ConnectionManager`]. Both are folded
/// into per-entity caches with a last-writer-wins policy guarded by sample
/// timestamps, so an older sample never replaces a newer one regardless of
/// the order they arrive in.
pub struct LiveTrackingService {
    connection: Arc<ConnectionManager>,
    snapshots: ArcSnapshotSource,
    drivers: Arc<TrackingCache<DriverTracking>>,
    routes: Arc<TrackingCache<RouteTracking>>,
    options: TrackingOptions,
}

impl fmt::Debug for LiveTrackingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveTrackingService")
            .field("connection", &self.connection)
            .field("cached_drivers", &self.drivers.len())
            .field("cached_routes", &self.routes.len())
            .field("options", &self.options)
            .finish()
    }
}

impl LiveTrackingService {
    pub fn new(
        connection: Arc<ConnectionManager>,
        snapshots: ArcSnapshotSource,
        options: TrackingOptions,
    ) -> Self {
        Self {
            connection,
            snapshots,
            drivers: Arc::new(TrackingCache::new()),
            routes: Arc::new(TrackingCache::new()),
            options,
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn options(&self) -> &TrackingOptions {
        &self.options
    }

    // ── Drivers ──────────────────────────────────────────────────────────

    /// Fetch a driver's current state.
    ///
    /// Resolves with the best-known state: a live update newer than the
    /// snapshot wins. The snapshot is cached only while a subscription holds
    /// the driver.
    pub async fn driver_snapshot(&self, driver_id: &str) -> Result<DriverTracking> {
        let snapshot = self.snapshots.driver_location(driver_id).await?;
        Ok(self.drivers.reconcile(snapshot))
    }

    /// Invoke `callback` with the merged driver state for every live update
    /// that is newer than what is cached.
    pub async fn subscribe_to_driver(
        &self,
        driver_id: &str,
        callback: impl Fn(&DriverTracking) + Send + Sync + 'static,
    ) -> Result<TrackingSubscription> {
        let id = driver_id.to_string();
        let cache = Arc::clone(&self.drivers);
        cache.retain(&id);

        let listener_cache = Arc::clone(&cache);
        let listener_id = id.clone();
        let listen = self.connection.listen(driver_topic(&id), move |message| {
            let ServerMessage::DriverUpdate {
                location, status, ..
            } = message
            else {
                return;
            };
            let (outcome, merged) = listener_cache.merge_with(&listener_id, |previous| {
                apply_driver_update(&listener_id, previous, location, *status)
            });
            if outcome.applied() {
                callback(&merged);
            }
        });

        match listen.await {
            Ok(guard) => Ok(TrackingSubscription::new(
                guard,
                Box::new(move || {
                    cache.release(&id);
                }),
            )),
            Err(e) => {
                cache.release(&id);
                Err(e)
            },
        }
    }

    pub fn cached_driver(&self, driver_id: &str) -> Option<DriverTracking> {
        self.drivers.get(driver_id)
    }

    /// One-shot fetch of every active driver.
    pub async fn list_active(&self) -> Result<Vec<DriverTracking>> {
        fetch_active(&self.snapshots, &self.drivers).await
    }

    /// Poll the active-driver list every `active_poll_interval_ms`.
    pub fn watch_active(&self) -> ActiveDriversPoller {
        ActiveDriversPoller::spawn(
            Arc::clone(&self.snapshots),
            Arc::clone(&self.drivers),
            Duration::from_millis(self.options.active_poll_interval_ms),
        )
    }

    /// Push the device's own position for `driver_id`.
    ///
    /// Fails with `NotConnected` when the socket is not open; nothing is
    /// queued.
    pub async fn update_location(&self, driver_id: &str, location: TrackingLocation) -> Result<()> {
        location.validate()?;
        self.connection
            .send(&ClientMessage::LocationUpdate {
                driver_id: driver_id.to_string(),
                location,
            })
            .await
    }

    // ── Routes ───────────────────────────────────────────────────────────

    pub async fn route_snapshot(&self, route_id: &str) -> Result<RouteTracking> {
        let mut snapshot = self.snapshots.route(route_id).await?;
        snapshot.positions.sort_by_key(|position| position.timestamp);
        truncate_front(&mut snapshot.positions, self.options.max_route_points);
        Ok(self.routes.reconcile(snapshot))
    }

    /// Invoke `callback` with the merged route for every live position
    /// update that is not older than the route's latest information.
    pub async fn subscribe_to_route(
        &self,
        route_id: &str,
        callback: impl Fn(&RouteTracking) + Send + Sync + 'static,
    ) -> Result<TrackingSubscription> {
        let id = route_id.to_string();
        let cache = Arc::clone(&self.routes);
        cache.retain(&id);

        let listener_cache = Arc::clone(&cache);
        let listener_id = id.clone();
        let max_points = self.options.max_route_points;
        let listen = self.connection.listen(route_topic(&id), move |message| {
            let ServerMessage::RouteUpdate {
                driver_id,
                position,
                status,
                ..
            } = message
            else {
                return;
            };
            let (outcome, merged) = listener_cache.merge_with(&listener_id, |previous| {
                apply_route_update(&listener_id, previous, driver_id.as_deref(), position, *status, max_points)
            });
            if outcome.applied() {
                callback(&merged);
            }
        });

        match listen.await {
            Ok(guard) => Ok(TrackingSubscription::new(
                guard,
                Box::new(move || {
                    cache.release(&id);
                }),
            )),
            Err(e) => {
                cache.release(&id);
                Err(e)
            },
        }
    }

    pub fn cached_route(&self, route_id: &str) -> Option<RouteTracking> {
        self.routes.get(route_id)
    }

    // ── Orders ───────────────────────────────────────────────────────────

    /// Tracking timeline of an order, oldest first.
    pub async fn order_tracks(&self, order_id: i64) -> Result<Vec<TrackEvent>> {
        let mut events = self.snapshots.order_tracks(order_id).await?;
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }
}

#[async_trait]
impl LocationSink for LiveTrackingService {
    async fn publish_location(&self, driver_id: &str, location: TrackingLocation) -> Result<()> {
        self.update_location(driver_id, location).await
    }
}

fn apply_driver_update(
    driver_id: &str,
    previous: Option<&DriverTracking>,
    location: &TrackingLocation,
    status: Option<DriverStatus>,
) -> DriverTracking {
    let mut next = match previous {
        Some(previous) => previous.clone(),
        None => DriverTracking::new(driver_id, location.clone()),
    };
    next.last_location = location.clone();
    if let Some(status) = status {
        next.status = status;
    }
    next
}

fn apply_route_update(
    route_id: &str,
    previous: Option<&RouteTracking>,
    driver_id: Option<&str>,
    position: &TrackingLocation,
    status: Option<RouteStatus>,
    max_points: usize,
) -> RouteTracking {
    let mut next = match previous {
        Some(previous) => previous.clone(),
        None => RouteTracking::new(route_id, position.timestamp),
    };
    if position.timestamp < next.updated_at {
        // Rejected by the cache's timestamp guard.
        next.updated_at = position.timestamp;
        return next;
    }

    match next.positions.last_mut() {
        Some(last) if last.timestamp == position.timestamp => *last = position.clone(),
        _ => next.positions.push(position.clone()),
    }
    truncate_front(&mut next.positions, max_points);
    next.updated_at = position.timestamp;
    if let Some(driver_id) = driver_id {
        next.driver_id = Some(driver_id.to_string());
    }
    if let Some(status) = status {
        next.status = status;
    }
    next
}

fn truncate_front<T>(items: &mut Vec<T>, max: usize) {
    if max > 0 && items.len() > max {
        items.drain(..items.len() - max);
    }
}

/// Disposer for one tracking listener.
///
/// `unsubscribe` (or dropping the value) removes the listener synchronously
/// and releases its cache reference. Other subscriptions on the same entity
/// are unaffected.
pub struct TrackingSubscription {
    guard: ListenerGuard,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl fmt::Debug for TrackingSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingSubscription")
            .field("topic", &self.guard.topic())
            .field("active", &self.is_active())
            .finish()
    }
}

impl TrackingSubscription {
    fn new(guard: ListenerGuard, release: Box<dyn FnOnce() + Send + Sync>) -> Self {
        Self {
            guard,
            release: Some(release),
        }
    }

    pub fn topic(&self) -> &str {
        self.guard.topic()
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_active()
    }

    /// Stop receiving updates. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        self.guard.dispose();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for TrackingSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
