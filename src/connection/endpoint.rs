//! Endpoint resolution: pick `wss://` for secure origins and `ws://` otherwise.

use reqwest::Url;

use crate::error::{FabzLinkError, Result};

/// Resolve the WebSocket URL for `base_url`.
///
/// `https`/`wss` bases resolve to the secure `wss` transport, `http`/`ws`
/// bases to plaintext `ws`. Any path, query or fragment on the base is
/// replaced by `ws_path`.
pub fn resolve_ws_url(base_url: &str, ws_path: &str) -> Result<String> {
    let base = Url::parse(base_url.trim()).map_err(|e| {
        FabzLinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
    })?;

    if base.host_str().is_none() {
        return Err(FabzLinkError::ConfigurationError(format!(
            "base_url '{}' must include a host",
            base_url
        )));
    }

    let ws_scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(FabzLinkError::ConfigurationError(format!(
                "Unsupported base_url scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };

    let mut ws_url = base.clone();
    ws_url.set_scheme(ws_scheme).map_err(|_| {
        FabzLinkError::ConfigurationError("Failed to set WebSocket URL scheme".to_string())
    })?;
    ws_url.set_fragment(None);
    ws_url.set_query(None);
    let path = if ws_path.starts_with('/') {
        ws_path.to_string()
    } else {
        format!("/{}", ws_path)
    };
    ws_url.set_path(&path);

    Ok(ws_url.to_string())
}

/// Build a base URL from host and port, secure or not.
pub fn base_url_for(host: &str, port: u16, secure: bool) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{}://{}:{}", scheme, host, port)
}

/// True if the resolved URL uses the secure transport.
pub fn is_secure_ws_url(ws_url: &str) -> bool {
    ws_url.starts_with("wss://")
}
