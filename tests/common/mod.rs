//! Local fixtures for the integration suites: a scriptable WebSocket
//! tracking server and a tiny HTTP responder for snapshot endpoints.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `check` every 10ms until it holds or `deadline` passes.
pub async fn eventually(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if check() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── WebSocket server ─────────────────────────────────────────────────────────

enum Outbound {
    Text(String),
    Drop,
}

#[derive(Default)]
struct WsState {
    /// (connection index, text frame) in arrival order.
    received: Mutex<Vec<(usize, String)>>,
    /// TCP connections accepted, including refused handshakes.
    tcp_accepts: AtomicUsize,
    /// WebSocket handshakes completed.
    handshakes: AtomicUsize,
    refuse: AtomicBool,
    clients: Mutex<Vec<mpsc::UnboundedSender<Outbound>>>,
}

/// Scriptable stand-in for the tracking socket endpoint.
pub struct MockTrackingServer {
    addr: SocketAddr,
    state: Arc<WsState>,
    task: JoinHandle<()>,
}

impl MockTrackingServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(WsState::default());

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.tcp_accepts.fetch_add(1, Ordering::SeqCst);
                if accept_state.refuse.load(Ordering::SeqCst) {
                    drop(stream);
                    continue;
                }
                tokio::spawn(serve_socket(stream, Arc::clone(&accept_state)));
            }
        });

        Self { addr, state, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn tcp_accepts(&self) -> usize {
        self.state.tcp_accepts.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    /// Drop every new connection before the handshake completes.
    pub fn set_refuse(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    /// Frames received on the `n`-th handshake (1-based).
    pub fn received_on(&self, connection: usize) -> Vec<String> {
        self.state
            .received
            .lock()
            .iter()
            .filter(|(conn, _)| *conn == connection)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub async fn wait_for_frame(&self, expected: &str, deadline: Duration) -> bool {
        eventually(deadline, || self.received().iter().any(|text| text == expected)).await
    }

    pub async fn wait_for_handshakes(&self, count: usize, deadline: Duration) -> bool {
        eventually(deadline, || self.handshakes() >= count).await
    }

    /// Send a text frame to every open connection.
    pub fn push(&self, frame: serde_json::Value) {
        let text = frame.to_string();
        self.state
            .clients
            .lock()
            .retain(|client| client.send(Outbound::Text(text.clone())).is_ok());
    }

    /// Abruptly drop every open connection (no close frame).
    pub fn drop_connections(&self) {
        for client in self.state.clients.lock().drain(..) {
            let _ = client.send(Outbound::Drop);
        }
    }
}

impl Drop for MockTrackingServer {
    fn drop(&mut self) {
        self.task.abort();
        self.drop_connections();
    }
}

async fn serve_socket(stream: TcpStream, state: Arc<WsState>) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.clients.lock().push(tx);
    let connection = state.handshakes.fetch_add(1, Ordering::SeqCst) + 1;

    let (mut sink, mut source) = ws.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                },
                Some(Outbound::Drop) | None => return,
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    state.received.lock().push((connection, text.as_str().to_owned()));
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {},
            },
        }
    }
}

// ── HTTP responder ───────────────────────────────────────────────────────────

/// Minimal HTTP/1.1 responder keyed by request path. Unknown paths get 404.
pub struct HttpFixture {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    task: JoinHandle<()>,
}

impl HttpFixture {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, (u16, String)>>> = Arc::default();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let task_routes = Arc::clone(&routes);
        let task_hits = Arc::clone(&hits);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(respond(stream, Arc::clone(&task_routes), Arc::clone(&task_hits)));
            }
        });

        Self {
            addr,
            routes,
            hits,
            task,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn route(&self, path: &str, status: u16, body: serde_json::Value) {
        self.routes
            .lock()
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().get(path).copied().unwrap_or(0)
    }
}

impl Drop for HttpFixture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn respond(
    mut stream: TcpStream,
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    *hits.lock().entry(path.clone()).or_insert(0) += 1;

    let (status, body) = routes
        .lock()
        .get(&path)
        .cloned()
        .unwrap_or((404, r#"{"detail":"Not Found"}"#.to_string()));
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
