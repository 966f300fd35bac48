// Shared helpers: boot a real server on an ephemeral port and talk raw WebSocket to it.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use kfc_server::domain::{Color, CommandStatus, Event, Layout, Snapshot};
use kfc_server::use_cases::GameOptions;
use kfc_server::{ServerConfig, run_with};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn test_config() -> ServerConfig {
    ServerConfig {
        layout: Layout::standard().expect("standard layout should parse"),
        options: GameOptions {
            tick_interval: Duration::from_millis(5),
            ..GameOptions::default()
        },
        acks: true,
    }
}

// Start a fresh server (one game per test) and return its ws:// URL.
pub async fn spawn_server(config: ServerConfig) -> String {
    // Bind to an ephemeral port to avoid collisions with local services.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        run_with(listener, config).await.expect("server failed");
    });
    format!("ws://{addr}/ws")
}

pub async fn connect(url: &str) -> WsClient {
    let (ws, _) = tokio::time::timeout(WAIT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("websocket connect");
    ws
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

// Next server event, skipping control frames; `None` once the socket closes.
pub async fn next_event(ws: &mut WsClient) -> Option<Event> {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")?;
        match frame {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(text.as_str()).expect("server sent an event"));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

// Skip events until one matches `pred`.
pub async fn wait_for<F>(ws: &mut WsClient, mut pred: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    loop {
        let event = next_event(ws)
            .await
            .expect("socket closed before the expected event");
        if pred(&event) {
            return event;
        }
    }
}

// Join and consume the assignment plus initial snapshot.
pub async fn join(ws: &mut WsClient, player: &str) -> (Event, Event) {
    send_json(ws, serde_json::json!({"kind": "join", "player": player})).await;
    let assign = next_event(ws).await.expect("assignment");
    let snapshot = next_event(ws).await.expect("initial snapshot");
    (assign, snapshot)
}

// Poll `cond` until it holds or WAIT elapses.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached before timeout");
}

/// How the stub treats newly accepted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubMode {
    /// Answers join, snapshot requests and commands.
    Serve,
    /// Completes the handshake, then never reads (no pongs either).
    Mute,
    /// Drops the TCP stream before the handshake.
    Refuse,
}

struct StubState {
    mode: Mutex<StubMode>,
    accepted: AtomicUsize,
    version: AtomicU64,
    commands: Mutex<Vec<String>>,
    muted: Mutex<Vec<WebSocketStream<TcpStream>>>,
    kill: broadcast::Sender<()>,
}

/// A scriptable game server whose connections tests can kill at will.
pub struct StubServer {
    pub url: String,
    state: Arc<StubState>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(mode: StubMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral test port");
        let addr = listener.local_addr().expect("get local addr");
        let (kill, _) = broadcast::channel(4);
        let state = Arc::new(StubState {
            mode: Mutex::new(mode),
            accepted: AtomicUsize::new(0),
            version: AtomicU64::new(1),
            commands: Mutex::new(Vec::new()),
            muted: Mutex::new(Vec::new()),
            kill,
        });
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&state)));
        Self {
            url: format!("ws://{addr}/ws"),
            state,
            task,
        }
    }

    pub fn set_mode(&self, mode: StubMode) {
        *self.state.mode.lock().expect("mode mutex poisoned") = mode;
    }

    pub fn set_version(&self, version: u64) {
        self.state.version.store(version, Ordering::SeqCst);
    }

    /// TCP connections accepted so far, refused ones included.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().expect("commands mutex poisoned").clone()
    }

    /// Drops every open connection without a close frame.
    pub fn kill_connections(&self) {
        let _ = self.state.kill.send(());
        self.state.muted.lock().expect("muted mutex poisoned").clear();
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.kill_connections();
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<StubState>) {
    while let Ok((stream, _)) = listener.accept().await {
        state.accepted.fetch_add(1, Ordering::SeqCst);
        let mode = *state.mode.lock().expect("mode mutex poisoned");
        match mode {
            StubMode::Refuse => drop(stream),
            StubMode::Mute => {
                if let Ok(ws) = accept_async(stream).await {
                    state.muted.lock().expect("muted mutex poisoned").push(ws);
                }
            }
            StubMode::Serve => {
                let kill = state.kill.subscribe();
                tokio::spawn(serve(stream, Arc::clone(&state), kill));
            }
        }
    }
}

async fn serve(stream: TcpStream, state: Arc<StubState>, mut kill: broadcast::Receiver<()>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    loop {
        let frame = tokio::select! {
            _ = kill.recv() => return,
            frame = ws.next() => frame,
        };
        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(_)) => continue,
            _ => return,
        };
        let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let reply = match value["kind"].as_str() {
            Some("join") => {
                let player = value["player"].as_str().and_then(|p| match p {
                    "B" => Some(Color::Black),
                    _ => None,
                });
                Event::assign_player(player.unwrap_or(Color::White), 0)
            }
            Some("get_snapshot") => {
                let snapshot = Snapshot {
                    version: state.version.load(Ordering::SeqCst),
                    ..Snapshot::default()
                };
                Event::state_snapshot(&snapshot, 0)
            }
            _ => {
                let cmd_id = value["cmd_id"].as_str().map(str::to_string);
                if let Some(id) = &cmd_id {
                    state.commands.lock().expect("commands mutex poisoned").push(id.clone());
                }
                Event::command_result(cmd_id.as_deref(), CommandStatus::Accepted, None, 0)
            }
        };
        let text = serde_json::to_string(&reply).expect("stub event serializes");
        if ws.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }
}
