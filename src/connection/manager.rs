//! The connection manager: one background task owns the socket.
//!
//! [`ConnectionManager`] is a cheap handle. Every operation is sent as a
//! [`ConnCmd`] to the connection task, which is the single owner of the
//! WebSocket sink, the [`SubscriptionRegistry`], the reconnect timer and the
//! attempt counter. Inbound frames arrive from a per-connection reader task
//! tagged with a generation id so frames of a superseded socket are ignored.
//!
//! ```text
//!  ConnectionManager ──cmd_tx──► ┌─────────────────────┐
//!                                │   connection task   │──► WsSink
//!  reader task (gen N) ─frames─► │ registry, timers,   │
//!                                │ state machine       │──► MessageRouter
//!                                └─────────────────────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::SinkExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::endpoint::resolve_ws_url;
use super::websocket::{
    encode_message, open_socket, parse_message, reader_loop, ConnectFailure, InboundFrame,
    WebSocketStream, WsSink,
};
use super::{COMMAND_CHANNEL_CAPACITY, FAR_FUTURE, INBOUND_CHANNEL_CAPACITY};
use crate::error::{FabzLinkError, Result};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::models::{ClientMessage, ConnectionOptions, ConnectionState, ServerMessage};
use crate::router::{ListenerGuard, MessageRouter};
use crate::subscription::{SubscriptionRegistry, Topics};
use crate::timeouts::LinkTimeouts;

/// Commands sent from [`ConnectionManager`] handles to the connection task.
pub(crate) enum ConnCmd {
    Connect {
        result_tx: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        done_tx: oneshot::Sender<()>,
    },
    Send {
        payload: String,
        kind: &'static str,
        result_tx: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        topics: Vec<String>,
    },
    /// `None` clears the whole set.
    Unsubscribe {
        topics: Option<Vec<String>>,
    },
    Topics {
        result_tx: oneshot::Sender<Vec<String>>,
    },
}

/// A handshake in flight. Dropping it abandons the attempt.
type DialFuture = Pin<Box<dyn Future<Output = std::result::Result<WebSocketStream, ConnectFailure>> + Send>>;

/// Handle to the live tracking socket.
///
/// Dropping the handle stops the connection task, closing the socket and
/// cancelling any pending reconnect.
pub struct ConnectionManager {
    ws_url: String,
    cmd_tx: mpsc::Sender<ConnCmd>,
    state_rx: watch::Receiver<ConnectionState>,
    reconnect_attempts: Arc<AtomicU32>,
    router: Arc<MessageRouter>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("ws_url", &self.ws_url)
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

impl ConnectionManager {
    /// Resolve the endpoint and spawn the connection task.
    ///
    /// Must be called from within a Tokio runtime. The manager starts
    /// `Disconnected`; call [`connect`](Self::connect) to open the socket.
    pub fn new(
        base_url: &str,
        options: ConnectionOptions,
        timeouts: LinkTimeouts,
        handlers: EventHandlers,
    ) -> Result<Self> {
        let ws_url = resolve_ws_url(base_url, &options.ws_path)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            FabzLinkError::ConfigurationError(
                "ConnectionManager must be created inside a Tokio runtime".to_string(),
            )
        })?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reconnect_attempts = Arc::new(AtomicU32::new(0));

        // Weak: listener guards must not keep the task alive.
        let release_tx = cmd_tx.downgrade();
        let router = Arc::new(MessageRouter::with_release_hook(Arc::new(move |topic: &str| {
            let Some(tx) = release_tx.upgrade() else {
                return;
            };
            let cmd = ConnCmd::Unsubscribe {
                topics: Some(vec![topic.to_string()]),
            };
            if tx.try_send(cmd).is_err() {
                log::warn!(
                    "[fabz-link] Could not queue unsubscribe for released topic '{}'",
                    topic
                );
            }
        })));

        let task = ConnectionTask {
            ws_url: ws_url.clone(),
            options,
            timeouts,
            handlers,
            router: Arc::clone(&router),
            state_tx,
            reconnect_attempts: Arc::clone(&reconnect_attempts),
            registry: SubscriptionRegistry::new(),
            sink: None,
            reader: None,
            generation: 0,
            inbound_tx,
            reconnect_at: None,
            idle_deadline: None,
            dialing: None,
            connect_waiters: Vec::new(),
        };
        let task = runtime.spawn(task.run(cmd_rx, inbound_rx, shutdown_rx));

        Ok(Self {
            ws_url,
            cmd_tx,
            state_rx,
            reconnect_attempts,
            router,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Resolved `ws://` / `wss://` endpoint.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Retries scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }

    /// A receiver that observes every state transition.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until `target` is the current state.
    pub async fn wait_for_state(
        &self,
        target: ConnectionState,
        timeout: Duration,
    ) -> Result<ConnectionState> {
        self.wait_until(|state| *state == target, timeout).await
    }

    /// Wait until the current state satisfies `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&ConnectionState) -> bool,
        timeout: Duration,
    ) -> Result<ConnectionState> {
        let mut rx = self.state_rx.clone();
        let reached = match tokio::time::timeout(timeout, rx.wait_for(predicate)).await {
            Ok(Ok(state)) => Ok(*state),
            Ok(Err(_)) => Err(task_gone()),
            Err(_) => Err(FabzLinkError::TimeoutError(format!(
                "State not reached within {:?} (current: {})",
                timeout,
                self.state()
            ))),
        };
        reached
    }

    /// Open the socket.
    ///
    /// Resolves once the first attempt has either opened the socket or
    /// failed. A retryable failure leaves the manager `Reconnecting` with a
    /// retry scheduled; the error is still returned. A `disconnect()` while
    /// the handshake is pending cancels it and fails this call.
    pub async fn connect(&self) -> Result<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.command(ConnCmd::Connect { result_tx }).await?;
        result_rx.await.map_err(|_| task_gone())?
    }

    /// Close the socket, cancel any pending reconnect and clear the
    /// subscription set.
    pub async fn disconnect(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command(ConnCmd::Disconnect { done_tx }).await?;
        done_rx.await.map_err(|_| task_gone())
    }

    /// Send one message. Nothing is queued: when the socket is not open the
    /// message is dropped and `NotConnected` is returned.
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        let state = self.state();
        if !state.is_connected() {
            log::warn!(
                "[fabz-link] Dropping {} message: not connected (state: {})",
                message.kind(),
                state
            );
            return Err(FabzLinkError::NotConnected(state));
        }

        let payload = encode_message(message)?;
        let (result_tx, result_rx) = oneshot::channel();
        self.command(ConnCmd::Send {
            payload,
            kind: message.kind(),
            result_tx,
        })
        .await?;
        result_rx.await.map_err(|_| task_gone())?
    }

    /// Add topics to the subscription set.
    pub async fn subscribe(&self, topics: impl Into<Topics>) -> Result<()> {
        let topics = topics.into().into_vec();
        self.command(ConnCmd::Subscribe { topics }).await
    }

    /// Clear the whole subscription set.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.command(ConnCmd::Unsubscribe { topics: None }).await
    }

    /// Remove only the named topics from the subscription set.
    pub async fn unsubscribe_topics(&self, topics: impl Into<Topics>) -> Result<()> {
        let topics = topics.into().into_vec();
        self.command(ConnCmd::Unsubscribe {
            topics: Some(topics),
        })
        .await
    }

    /// Current subscription set, sorted.
    pub async fn topics(&self) -> Result<Vec<String>> {
        let (result_tx, result_rx) = oneshot::channel();
        self.command(ConnCmd::Topics { result_tx }).await?;
        result_rx.await.map_err(|_| task_gone())
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Register `callback` on `topic` and make sure the topic is part of the
    /// subscription set. Dropping the guard removes the listener; when it was
    /// the last one on the topic, the topic is unsubscribed.
    pub async fn listen(
        &self,
        topic: impl Into<String>,
        callback: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> Result<ListenerGuard> {
        let topic = topic.into();
        let (guard, first) = self.router.register(topic.clone(), callback);
        if first {
            log::debug!("[fabz-link] First listener on '{}'", topic);
        }
        // Always forwarded: the registry ignores topics it already holds, and
        // after a disconnect() the set may have been cleared under us.
        self.command(ConnCmd::Subscribe {
            topics: vec![topic],
        })
        .await?;
        Ok(guard)
    }

    /// Stop the connection task and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn command(&self, cmd: ConnCmd) -> Result<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| task_gone())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn task_gone() -> FabzLinkError {
    FabzLinkError::InternalError("connection task has stopped".to_string())
}

/// Resolve with the handshake in flight, or never when there is none.
async fn next_dial(
    dialing: &mut Option<DialFuture>,
) -> std::result::Result<WebSocketStream, ConnectFailure> {
    match dialing.as_mut() {
        Some(dial) => dial.await,
        None => std::future::pending().await,
    }
}

/// Copy of a handshake error for each waiting `connect()` caller.
fn copy_connect_error(error: &FabzLinkError) -> FabzLinkError {
    match error {
        FabzLinkError::ConfigurationError(message) => {
            FabzLinkError::ConfigurationError(message.clone())
        },
        FabzLinkError::TimeoutError(message) => FabzLinkError::TimeoutError(message.clone()),
        FabzLinkError::WebSocketError(message) => FabzLinkError::WebSocketError(message.clone()),
        other => FabzLinkError::InternalError(other.to_string()),
    }
}

/// State owned by the background connection task.
struct ConnectionTask {
    ws_url: String,
    options: ConnectionOptions,
    timeouts: LinkTimeouts,
    handlers: EventHandlers,
    router: Arc<MessageRouter>,
    state_tx: watch::Sender<ConnectionState>,
    reconnect_attempts: Arc<AtomicU32>,
    registry: SubscriptionRegistry,
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
    generation: u64,
    inbound_tx: mpsc::Sender<(u64, InboundFrame)>,
    reconnect_at: Option<Instant>,
    idle_deadline: Option<Instant>,
    dialing: Option<DialFuture>,
    /// `connect()` callers waiting on the handshake in flight.
    connect_waiters: Vec<oneshot::Sender<Result<()>>>,
}

impl ConnectionTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<ConnCmd>,
        mut inbound_rx: mpsc::Receiver<(u64, InboundFrame)>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        log::debug!("[fabz-link] Connection task started for {}", self.ws_url);

        loop {
            let far = Instant::now() + FAR_FUTURE;
            let reconnect_sleep = tokio::time::sleep_until(self.reconnect_at.unwrap_or(far));
            let idle_sleep = tokio::time::sleep_until(self.idle_deadline.unwrap_or(far));
            tokio::pin!(reconnect_sleep, idle_sleep);

            tokio::select! {
                biased;

                _ = &mut shutdown_rx => break,

                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some((generation, frame)) = inbound_rx.recv() => {
                    self.handle_inbound(generation, frame).await;
                },

                outcome = next_dial(&mut self.dialing), if self.dialing.is_some() => {
                    self.dialing = None;
                    self.finish_connect(outcome).await;
                },

                _ = &mut reconnect_sleep, if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    log::info!(
                        "[fabz-link] Reconnecting (attempt {}/{})",
                        self.reconnect_attempts.load(Ordering::Acquire),
                        self.options.max_reconnect_attempts
                    );
                    self.begin_connect();
                },

                _ = &mut idle_sleep, if self.idle_deadline.is_some() => {
                    self.send_keepalive().await;
                },
            }
        }

        self.dialing = None;
        self.connect_waiters.clear();
        self.close_socket(None).await;
        self.reconnect_at = None;
        self.set_state(ConnectionState::Disconnected);
        log::debug!("[fabz-link] Connection task stopped");
    }

    async fn handle_command(&mut self, cmd: ConnCmd) {
        match cmd {
            ConnCmd::Connect { result_tx } => {
                if self.sink.is_some() {
                    let _ = result_tx.send(Ok(()));
                    return;
                }
                self.connect_waiters.push(result_tx);
                if self.dialing.is_none() {
                    self.reconnect_at = None;
                    self.reconnect_attempts.store(0, Ordering::Release);
                    // Listeners that survived a disconnect() get their topics back.
                    let _ = self.registry.subscribe(self.router.topics());
                    self.begin_connect();
                }
            },
            ConnCmd::Disconnect { done_tx } => {
                if self.dialing.take().is_some() {
                    log::info!("[fabz-link] Connection attempt to {} cancelled", self.ws_url);
                }
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Err(FabzLinkError::WebSocketError(
                        "Connection attempt cancelled by disconnect()".to_string(),
                    )));
                }
                self.reconnect_at = None;
                let unsubscribe = self.registry.clear();
                let was_open = self.sink.is_some();
                self.close_socket(Some(unsubscribe)).await;
                self.reconnect_attempts.store(0, Ordering::Release);
                self.set_state(ConnectionState::Disconnected);
                if was_open {
                    log::info!("[fabz-link] Disconnected from {}", self.ws_url);
                    self.handlers
                        .emit_close(DisconnectReason::with_code("Client disconnected", 1000));
                }
                let _ = done_tx.send(());
            },
            ConnCmd::Send {
                payload,
                kind,
                result_tx,
            } => {
                let result = if self.sink.is_some() {
                    self.write_text(payload).await
                } else {
                    let state = *self.state_tx.borrow();
                    log::warn!(
                        "[fabz-link] Dropping {} message: not connected (state: {})",
                        kind,
                        state
                    );
                    Err(FabzLinkError::NotConnected(state))
                };
                let _ = result_tx.send(result);
            },
            ConnCmd::Subscribe { topics } => {
                if let Some(message) = self.registry.subscribe(topics) {
                    self.send_control(&message).await;
                }
            },
            ConnCmd::Unsubscribe { topics } => {
                let message = match topics {
                    Some(topics) => self.registry.unsubscribe_topics(topics),
                    None => Some(self.registry.clear()),
                };
                if let Some(message) = message {
                    self.send_control(&message).await;
                }
            },
            ConnCmd::Topics { result_tx } => {
                let _ = result_tx.send(self.registry.topics());
            },
        }
    }

    async fn handle_inbound(&mut self, generation: u64, frame: InboundFrame) {
        if generation != self.generation || self.sink.is_none() {
            log::debug!(
                "[fabz-link] Discarding frame from superseded connection (gen {}, current {})",
                generation,
                self.generation
            );
            return;
        }
        self.touch();

        match frame {
            InboundFrame::Text(text) => {
                self.handlers.emit_message(&text);
                match parse_message(&text) {
                    Ok(message) => {
                        self.router.dispatch(&message);
                    },
                    Err(e) => {
                        log::warn!("[fabz-link] Ignoring unrecognized frame: {}", e);
                    },
                }
            },
            InboundFrame::Closed(reason) => {
                log::info!("[fabz-link] Connection closed: {}", reason);
                self.handle_transport_loss(reason).await;
            },
            InboundFrame::Failed(message) => {
                log::warn!("[fabz-link] WebSocket error: {}", message);
                self.handlers
                    .emit_error(ConnectionError::new(format!("WebSocket error: {}", message), true));
                self.handle_transport_loss(DisconnectReason::new(message)).await;
            },
        }
    }

    /// Start one connection attempt. The select loop polls the handshake
    /// alongside commands and shutdown.
    fn begin_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
        log::info!("[fabz-link] Connecting to {}", self.ws_url);

        let ws_url = self.ws_url.clone();
        let timeouts = self.timeouts.clone();
        self.dialing = Some(Box::pin(async move { open_socket(&ws_url, &timeouts).await }));
    }

    /// Settle a finished attempt. On failure either schedules a retry or
    /// enters `Failed`.
    async fn finish_connect(&mut self, outcome: std::result::Result<WebSocketStream, ConnectFailure>) {
        let waiters = std::mem::take(&mut self.connect_waiters);
        match outcome {
            Ok(stream) => {
                self.on_socket_open(stream).await;
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
            },
            Err(failure) => {
                log::warn!("[fabz-link] Connection attempt failed: {}", failure.error);
                self.handlers
                    .emit_error(ConnectionError::new(failure.error.to_string(), failure.retryable));
                if failure.retryable {
                    self.schedule_reconnect();
                } else {
                    self.set_state(ConnectionState::Failed);
                }
                for waiter in waiters {
                    let _ = waiter.send(Err(copy_connect_error(&failure.error)));
                }
            },
        }
    }

    async fn on_socket_open(&mut self, stream: WebSocketStream) {
        use futures_util::StreamExt;

        let (sink, source) = stream.split();
        self.generation += 1;
        self.reader = Some(tokio::spawn(reader_loop(
            source,
            self.generation,
            self.inbound_tx.clone(),
        )));
        self.sink = Some(sink);
        self.reconnect_attempts.store(0, Ordering::Release);
        self.touch();
        self.set_state(ConnectionState::Connected);
        log::info!("[fabz-link] Connected to {}", self.ws_url);

        if let Some(message) = self.registry.replay() {
            log::info!(
                "[fabz-link] Re-subscribing to {} topic(s) after connect",
                self.registry.len()
            );
            self.send_control(&message).await;
        }
        self.handlers.emit_open();
    }

    async fn handle_transport_loss(&mut self, reason: DisconnectReason) {
        self.drop_socket();
        self.handlers.emit_close(reason);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.options.auto_reconnect {
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        let attempts = self.reconnect_attempts.load(Ordering::Acquire);
        if attempts >= self.options.max_reconnect_attempts {
            let message = format!(
                "Max reconnection attempts ({}) reached",
                self.options.max_reconnect_attempts
            );
            log::warn!("[fabz-link] {}", message);
            self.handlers.emit_error(ConnectionError::new(message, false));
            self.set_state(ConnectionState::Failed);
            return;
        }

        let attempts = attempts + 1;
        self.reconnect_attempts.store(attempts, Ordering::Release);
        let delay = Duration::from_millis(self.options.reconnect_interval_ms);
        self.reconnect_at = Some(Instant::now() + delay);
        self.set_state(ConnectionState::Reconnecting);
        log::info!(
            "[fabz-link] Attempting reconnection in {}ms (attempt {}/{})",
            self.options.reconnect_interval_ms,
            attempts,
            self.options.max_reconnect_attempts
        );
    }

    /// Send a control message if the socket is open. Failures are logged;
    /// the reader notices a dead socket on its own.
    async fn send_control(&mut self, message: &ClientMessage) {
        if self.sink.is_none() {
            return;
        }
        let payload = match encode_message(message) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("[fabz-link] {}", e);
                return;
            },
        };
        if let Err(e) = self.write_text(payload).await {
            log::warn!("[fabz-link] Failed to send {}: {}", message.kind(), e);
        }
    }

    async fn write_text(&mut self, payload: String) -> Result<()> {
        let state = *self.state_tx.borrow();
        let Some(sink) = self.sink.as_mut() else {
            return Err(FabzLinkError::NotConnected(state));
        };

        let send = sink.send(Message::Text(payload.clone().into()));
        let result = if LinkTimeouts::is_no_timeout(self.timeouts.send_timeout) {
            Ok(send.await)
        } else {
            tokio::time::timeout(self.timeouts.send_timeout, send).await
        };

        match result {
            Ok(Ok(())) => {
                self.handlers.emit_send(&payload);
                Ok(())
            },
            Ok(Err(e)) => Err(FabzLinkError::WebSocketError(format!("Failed to send: {}", e))),
            Err(_) => Err(FabzLinkError::TimeoutError(format!(
                "Send timeout ({:?})",
                self.timeouts.send_timeout
            ))),
        }
    }

    async fn send_keepalive(&mut self) {
        self.touch();
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let result = sink.send(Message::Ping(Bytes::new())).await;
        if let Err(e) = result {
            log::warn!("[fabz-link] Keepalive ping failed: {}", e);
            self.handlers
                .emit_error(ConnectionError::new(format!("Keepalive failed: {}", e), true));
            self.handle_transport_loss(DisconnectReason::new("Keepalive failed"))
                .await;
        }
    }

    /// Push the idle deadline forward. Disabled when no socket is open or
    /// keepalive is off.
    fn touch(&mut self) {
        self.idle_deadline = if self.sink.is_some()
            && !LinkTimeouts::is_no_timeout(self.timeouts.keepalive_interval)
        {
            Some(Instant::now() + self.timeouts.keepalive_interval)
        } else {
            None
        };
    }

    /// Gracefully close the socket, optionally sending one last message.
    async fn close_socket(&mut self, farewell: Option<ClientMessage>) {
        if self.sink.is_some() {
            if let Some(message) = farewell {
                self.send_control(&message).await;
            }
        }
        if let Some(mut sink) = self.sink.take() {
            if LinkTimeouts::is_no_timeout(self.timeouts.send_timeout) {
                let _ = sink.close().await;
            } else if tokio::time::timeout(self.timeouts.send_timeout, sink.close())
                .await
                .is_err()
            {
                log::debug!("[fabz-link] Close handshake timed out");
            }
        }
        self.drop_socket();
    }

    /// Forget the current socket without a close handshake. Bumps the
    /// generation so frames still queued from its reader are ignored.
    fn drop_socket(&mut self) {
        self.sink = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.generation += 1;
        self.idle_deadline = None;
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            log::debug!("[fabz-link] State {} -> {}", previous, state);
            self.handlers.emit_state_change(state);
        }
    }
}
