//! File + environment configuration for a fabz-link client.
//!
//! ```toml
//! base_url = "https://ops.fabzclean.com"
//!
//! [connection]
//! max_reconnect_attempts = 5
//! reconnect_interval_ms = 3000
//!
//! [timeouts]
//! connection_timeout = 10000
//!
//! [tracking]
//! active_poll_interval_ms = 30000
//!
//! [watch]
//! min_interval_ms = 5000
//! ```
//!
//! Every section is optional. Environment variables prefixed `FABZ_LINK_`
//! override file values; see [`LinkConfig::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::connection::resolve_ws_url;
use crate::error::{FabzLinkError, Result};
use crate::models::{ConnectionOptions, TrackingOptions, WatchOptions};
use crate::timeouts::LinkTimeouts;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Backend origin, e.g. `https://ops.fabzclean.com`. The socket endpoint
    /// and snapshot URLs are derived from it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub connection: ConnectionOptions,

    #[serde(default)]
    pub timeouts: LinkTimeouts,

    #[serde(default)]
    pub tracking: TrackingOptions,

    #[serde(default)]
    pub watch: WatchOptions,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connection: ConnectionOptions::default(),
            timeouts: LinkTimeouts::default(),
            tracking: TrackingOptions::default(),
            watch: WatchOptions::default(),
        }
    }
}

impl LinkConfig {
    /// Read a TOML file, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without applying overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FabzLinkError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            FabzLinkError::ConfigurationError(format!("Failed to parse config file: {}", e))
        })
    }

    /// Apply `FABZ_LINK_*` variables from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `FABZ_LINK_BASE_URL` | `base_url` |
    /// | `FABZ_LINK_WS_PATH` | `connection.ws_path` |
    /// | `FABZ_LINK_AUTO_RECONNECT` | `connection.auto_reconnect` |
    /// | `FABZ_LINK_RECONNECT_INTERVAL_MS` | `connection.reconnect_interval_ms` |
    /// | `FABZ_LINK_MAX_RECONNECT_ATTEMPTS` | `connection.max_reconnect_attempts` |
    /// | `FABZ_LINK_CONNECTION_TIMEOUT_MS` | `timeouts.connection_timeout` |
    /// | `FABZ_LINK_ACTIVE_POLL_INTERVAL_MS` | `tracking.active_poll_interval_ms` |
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with a
    /// custom variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("FABZ_LINK_BASE_URL") {
            self.base_url = url;
        }

        if let Some(path) = lookup("FABZ_LINK_WS_PATH") {
            self.connection.ws_path = path;
        }

        if let Some(val) = lookup("FABZ_LINK_AUTO_RECONNECT") {
            self.connection.auto_reconnect = parse_bool("FABZ_LINK_AUTO_RECONNECT", &val)?;
        }

        if let Some(val) = lookup("FABZ_LINK_RECONNECT_INTERVAL_MS") {
            self.connection.reconnect_interval_ms = parse_number("FABZ_LINK_RECONNECT_INTERVAL_MS", &val)?;
        }

        if let Some(val) = lookup("FABZ_LINK_MAX_RECONNECT_ATTEMPTS") {
            self.connection.max_reconnect_attempts =
                parse_number("FABZ_LINK_MAX_RECONNECT_ATTEMPTS", &val)?;
        }

        if let Some(val) = lookup("FABZ_LINK_CONNECTION_TIMEOUT_MS") {
            self.timeouts.connection_timeout =
                Duration::from_millis(parse_number("FABZ_LINK_CONNECTION_TIMEOUT_MS", &val)?);
        }

        if let Some(val) = lookup("FABZ_LINK_ACTIVE_POLL_INTERVAL_MS") {
            self.tracking.active_poll_interval_ms =
                parse_number("FABZ_LINK_ACTIVE_POLL_INTERVAL_MS", &val)?;
        }

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        resolve_ws_url(&self.base_url, &self.connection.ws_path)?;

        if self.connection.auto_reconnect && self.connection.reconnect_interval_ms == 0 {
            return Err(FabzLinkError::ConfigurationError(
                "connection.reconnect_interval_ms must be greater than 0 when auto_reconnect is on"
                    .to_string(),
            ));
        }

        if self.tracking.active_poll_interval_ms == 0 {
            return Err(FabzLinkError::ConfigurationError(
                "tracking.active_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if !self.watch.min_distance_m.is_finite() || self.watch.min_distance_m < 0.0 {
            return Err(FabzLinkError::ConfigurationError(format!(
                "watch.min_distance_m must be a non-negative number, got {}",
                self.watch.min_distance_m
            )));
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(FabzLinkError::ConfigurationError(format!(
            "Invalid {} value: {}",
            key, value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        FabzLinkError::ConfigurationError(format!("Invalid {} value: {}", key, value))
    })
}
