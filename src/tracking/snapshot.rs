//! One-shot snapshot reads over HTTP.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{FabzLinkError, Result};
use crate::models::{DriverTracking, RouteTracking, TrackEvent};
use crate::timeouts::LinkTimeouts;

/// Source of snapshot reads used to prime tracking state.
///
/// [`HttpSnapshotClient`] is the production implementation; tests and
/// offline tools can provide their own.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn driver_location(&self, driver_id: &str) -> Result<DriverTracking>;

    async fn active_drivers(&self) -> Result<Vec<DriverTracking>>;

    async fn route(&self, route_id: &str) -> Result<RouteTracking>;

    /// Tracking timeline of an order, in any order.
    async fn order_tracks(&self, order_id: i64) -> Result<Vec<TrackEvent>>;
}

pub type ArcSnapshotSource = Arc<dyn SnapshotSource>;

/// Error body returned by the backend (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Snapshot reads against the backend's tracking endpoints.
#[derive(Debug, Clone)]
pub struct HttpSnapshotClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpSnapshotClient {
    pub fn new(base_url: impl Into<String>, timeouts: &LinkTimeouts) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if !LinkTimeouts::is_no_timeout(timeouts.http_timeout) {
            builder = builder.timeout(timeouts.http_timeout);
        }
        if !LinkTimeouts::is_no_timeout(timeouts.connection_timeout) {
            builder = builder.connect_timeout(timeouts.connection_timeout);
        }
        let http_client = builder.build().map_err(|e| {
            FabzLinkError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::with_client(base_url, http_client))
    }

    /// Use an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `{base_url}/{segments...}`, encoding each segment so ids with
    /// reserved characters stay within one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            FabzLinkError::ConfigurationError(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                FabzLinkError::ConfigurationError(format!(
                    "Base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let start = Instant::now();
        debug!("[fabz-link] GET {}", url);

        let response = self.http_client.get(url.clone()).send().await.map_err(|e| {
            warn!("[fabz-link] Snapshot request to {} failed: {}", url, e);
            FabzLinkError::from(e)
        })?;
        let status = response.status();
        debug!(
            "[fabz-link] Response received: status={} duration_ms={}",
            status,
            start.elapsed().as_millis()
        );

        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str::<T>(&body).map_err(|e| {
                FabzLinkError::SerializationError(format!("Invalid snapshot from {}: {}", path, e))
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = match serde_json::from_str::<ErrorBody>(&error_text) {
            Ok(body) => body.detail,
            Err(_) if error_text.is_empty() => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
            Err(_) => error_text,
        };
        warn!(
            "[fabz-link] Server error: status={} message=\"{}\"",
            status, message
        );
        Err(FabzLinkError::ServerError {
            status_code: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotClient {
    async fn driver_location(&self, driver_id: &str) -> Result<DriverTracking> {
        self.get_json(&["api", "tracking", "drivers", driver_id, "location"])
            .await
    }

    async fn active_drivers(&self) -> Result<Vec<DriverTracking>> {
        self.get_json(&["api", "tracking", "drivers", "active"]).await
    }

    async fn route(&self, route_id: &str) -> Result<RouteTracking> {
        self.get_json(&["api", "tracking", "routes", route_id]).await
    }

    async fn order_tracks(&self, order_id: i64) -> Result<Vec<TrackEvent>> {
        let order_id = order_id.to_string();
        self.get_json(&["api", "tracks", "order", &order_id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = HttpSnapshotClient::new("http://localhost:8000/", &LinkTimeouts::fast()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_endpoint_encodes_ids_as_single_segments() {
        let client = HttpSnapshotClient::new("http://localhost:8000", &LinkTimeouts::fast()).unwrap();
        let url = client
            .endpoint(&["api", "tracking", "drivers", "D/1?x#y", "location"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/tracking/drivers/D%2F1%3Fx%23y/location"
        );

        let prefixed = HttpSnapshotClient::new("http://localhost:8000/ops/", &LinkTimeouts::fast()).unwrap();
        let url = prefixed.endpoint(&["api", "tracking", "routes", "R1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/ops/api/tracking/routes/R1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpSnapshotClient::new(format!("http://{}", addr), &LinkTimeouts::fast()).unwrap();
        let err = client.active_drivers().await.unwrap_err();
        assert!(matches!(err, FabzLinkError::NetworkError(_)));
    }
}
