//! Low-level WebSocket helpers: dialing with a timeout, error
//! classification, frame encoding/decoding and the per-connection reader.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{error::Error as WsError, protocol::Message};
use tokio_tungstenite::MaybeTlsStream;

use crate::error::{FabzLinkError, Result};
use crate::event_handlers::DisconnectReason;
use crate::models::{ClientMessage, ServerMessage};
use crate::timeouts::LinkTimeouts;

use super::MAX_TEXT_FRAME_BYTES;

pub(crate) type WebSocketStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WebSocketStream, Message>;
pub(crate) type WsSource = SplitStream<WebSocketStream>;

/// Why a connection attempt failed, and whether retrying makes sense.
#[derive(Debug)]
pub(crate) struct ConnectFailure {
    pub error: FabzLinkError,
    pub retryable: bool,
}

/// Dial `ws_url`, honoring the connection timeout.
pub(crate) async fn open_socket(
    ws_url: &str,
    timeouts: &LinkTimeouts,
) -> std::result::Result<WebSocketStream, ConnectFailure> {
    let connect = tokio_tungstenite::connect_async(ws_url);
    let result = if LinkTimeouts::is_no_timeout(timeouts.connection_timeout) {
        Ok(connect.await)
    } else {
        tokio::time::timeout(timeouts.connection_timeout, connect).await
    };

    match result {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(WsError::Http(response))) => {
            let status = response.status().as_u16();
            let body_text = response
                .body()
                .as_ref()
                .and_then(|b| {
                    if b.is_empty() {
                        None
                    } else {
                        Some(String::from_utf8_lossy(b).into_owned())
                    }
                })
                .unwrap_or_default();
            let message = match status {
                401 => "Unauthorized: tracking socket requires valid credentials".to_string(),
                403 => "Forbidden: access to tracking socket denied".to_string(),
                code if body_text.is_empty() => format!("WebSocket HTTP error: {}", code),
                code => format!("WebSocket HTTP error {}: {}", code, body_text),
            };
            // Server errors may clear up; client errors will not.
            Err(ConnectFailure {
                error: FabzLinkError::WebSocketError(message),
                retryable: status >= 500,
            })
        },
        Ok(Err(WsError::Url(e))) => Err(ConnectFailure {
            error: FabzLinkError::ConfigurationError(format!("Invalid WebSocket URL: {}", e)),
            retryable: false,
        }),
        Ok(Err(e)) => Err(ConnectFailure {
            error: FabzLinkError::WebSocketError(format!("Connection failed: {}", e)),
            retryable: true,
        }),
        Err(_) => Err(ConnectFailure {
            error: FabzLinkError::TimeoutError(format!(
                "Connection timeout ({:?})",
                timeouts.connection_timeout
            )),
            retryable: true,
        }),
    }
}

pub(crate) fn encode_message(message: &ClientMessage) -> Result<String> {
    serde_json::to_string(message).map_err(|e| {
        FabzLinkError::SerializationError(format!("Failed to serialize {}: {}", message.kind(), e))
    })
}

pub(crate) fn parse_message(text: &str) -> Result<ServerMessage> {
    serde_json::from_str::<ServerMessage>(text).map_err(|e| {
        FabzLinkError::SerializationError(format!("Failed to parse message as ServerMessage: {}", e))
    })
}

/// What a reader task forwards to the connection task.
#[derive(Debug)]
pub(crate) enum InboundFrame {
    Text(String),
    Closed(DisconnectReason),
    Failed(String),
}

/// Read frames from one connection instance and forward them tagged with
/// `generation`. Exits when the stream ends or the receiver is gone.
pub(crate) async fn reader_loop(
    mut source: WsSource,
    generation: u64,
    inbound_tx: mpsc::Sender<(u64, InboundFrame)>,
) {
    loop {
        let frame = match source.next().await {
            Some(Ok(Message::Text(text))) => {
                if text.len() > MAX_TEXT_FRAME_BYTES {
                    log::warn!("[fabz-link] Text frame too large ({} bytes), dropping", text.len());
                    continue;
                }
                InboundFrame::Text(text.as_str().to_owned())
            },
            Some(Ok(Message::Binary(data))) => {
                if data.len() > MAX_TEXT_FRAME_BYTES {
                    log::warn!("[fabz-link] Binary frame too large ({} bytes), dropping", data.len());
                    continue;
                }
                match String::from_utf8(data.to_vec()) {
                    Ok(text) => InboundFrame::Text(text),
                    Err(e) => {
                        log::warn!("[fabz-link] Invalid UTF-8 in binary frame: {}", e);
                        continue;
                    },
                }
            },
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(f) => DisconnectReason::with_code(f.reason.as_str(), f.code.into()),
                    None => DisconnectReason::new("Server closed connection"),
                };
                let _ = inbound_tx.send((generation, InboundFrame::Closed(reason))).await;
                return;
            },
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                continue;
            },
            Some(Err(e)) => {
                let _ = inbound_tx
                    .send((generation, InboundFrame::Failed(e.to_string())))
                    .await;
                return;
            },
            None => {
                let _ = inbound_tx
                    .send((
                        generation,
                        InboundFrame::Closed(DisconnectReason::new("WebSocket stream ended")),
                    ))
                    .await;
                return;
            },
        };

        if inbound_tx.send((generation, frame)).await.is_err() {
            return;
        }
    }
}
