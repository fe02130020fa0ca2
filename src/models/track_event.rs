use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step in an order's tracking timeline (scanned at pickup, processed,
/// out for delivery, ...). Read through snapshots only; never pushed live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    pub id: i64,
    pub order_id: i64,
    #[serde(default)]
    pub worker_id: Option<i64>,
    /// Short action label, at most 64 characters server-side.
    pub action: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Free-form location text entered by the worker.
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}
