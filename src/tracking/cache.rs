//! Reference-counted, timestamp-guarded cache of tracked entities.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{DriverTracking, RouteTracking};

/// An entity the tracking cache can hold.
pub trait TrackedEntity: Clone + Send + Sync + 'static {
    fn entity_id(&self) -> &str;

    /// Timestamp of the newest information in this value. Merges never let
    /// this go backwards.
    fn observed_at(&self) -> DateTime<Utc>;
}

impl TrackedEntity for DriverTracking {
    fn entity_id(&self) -> &str {
        &self.driver_id
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.last_location.timestamp
    }
}

impl TrackedEntity for RouteTracking {
    fn entity_id(&self) -> &str {
        &self.route_id
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Result of folding a value into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No value was cached for the id.
    Inserted,
    /// The cached value was replaced (newer or equal timestamp).
    Updated,
    /// The candidate was older than the cached value and was discarded.
    Stale,
}

impl MergeOutcome {
    pub fn applied(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

#[derive(Debug)]
struct CacheEntry<T> {
    value: Option<T>,
    refs: usize,
}

/// Best-known state per entity id.
///
/// Entries are retained by live subscribers and evicted when the last one
/// releases them. Snapshot reads go through [`reconcile`](Self::reconcile)
/// and never create entries.
#[derive(Debug)]
pub struct TrackingCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for TrackingCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: TrackedEntity> TrackingCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.entries.read().get(id).and_then(|entry| entry.value.clone())
    }

    /// Fold a complete value into the cache.
    ///
    /// Returns the outcome and the value now cached, which is the cached one
    /// when `value` was stale.
    pub fn merge(&self, value: T) -> (MergeOutcome, T) {
        let id = value.entity_id().to_string();
        self.merge_with(&id, move |_| value)
    }

    /// Build a candidate from the cached value (if any) and fold it in.
    ///
    /// `build` runs under the cache lock and must not call back into it.
    pub fn merge_with(&self, id: &str, build: impl FnOnce(Option<&T>) -> T) -> (MergeOutcome, T) {
        let mut entries = self.entries.write();
        let entry = entries.entry(id.to_string()).or_insert(CacheEntry {
            value: None,
            refs: 0,
        });

        let candidate = build(entry.value.as_ref());
        match &entry.value {
            Some(current) if candidate.observed_at() < current.observed_at() => {
                log::debug!(
                    "[fabz-link] Discarding stale update for '{}' ({} < {})",
                    id,
                    candidate.observed_at(),
                    current.observed_at()
                );
                (MergeOutcome::Stale, current.clone())
            },
            Some(_) => {
                entry.value = Some(candidate.clone());
                (MergeOutcome::Updated, candidate)
            },
            None => {
                entry.value = Some(candidate.clone());
                (MergeOutcome::Inserted, candidate)
            },
        }
    }

    /// Reconcile `value` with the cache without creating an entry: the
    /// cached value wins if it is newer, and a newer `value` refreshes an
    /// existing entry.
    pub fn reconcile(&self, value: T) -> T {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(value.entity_id()) else {
            return value;
        };
        match &entry.value {
            Some(current) if value.observed_at() < current.observed_at() => current.clone(),
            _ => {
                entry.value = Some(value.clone());
                value
            },
        }
    }

    /// Take a reference on `id`, creating an empty entry if needed.
    pub fn retain(&self, id: &str) {
        let mut entries = self.entries.write();
        entries
            .entry(id.to_string())
            .or_insert(CacheEntry {
                value: None,
                refs: 0,
            })
            .refs += 1;
    }

    /// Drop a reference on `id`. Returns true when that evicted the entry.
    pub fn release(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            entries.remove(id);
            log::debug!("[fabz-link] Evicted '{}' from tracking cache", id);
            true
        } else {
            false
        }
    }

    pub fn ref_count(&self, id: &str) -> usize {
        self.entries.read().get(id).map_or(0, |entry| entry.refs)
    }

    /// Ids with a cached value.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.value.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|entry| entry.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every value that no subscriber holds.
    pub fn clear(&self) {
        self.entries.write().retain(|_, entry| entry.refs > 0);
    }
}
