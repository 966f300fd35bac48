// WebSocket client transport with heartbeat, reconnect and one-shot send retry.

use super::backoff::{Backoff, BackoffPolicy};
use super::transport::{Transport, TransportError, ensure_cmd_id};
use crate::domain::{Color, Command, Event};
use crate::interface_adapters::protocol::{ClientMessage, ControlMessage, decode_event};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<Mutex<SplitSink<WsStream, Message>>>;

#[derive(Debug, Clone)]
pub struct WsTransportConfig {
    pub url: String,
    /// Side to request on join; `None` lets the server choose.
    pub player: Option<Color>,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// `None` keeps reconnecting forever.
    pub max_reconnect_attempts: Option<u32>,
}

impl WsTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            player: None,
            ping_interval: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
            max_reconnect_attempts: None,
        }
    }

    pub fn with_player(mut self, player: Color) -> Self {
        self.player = Some(player);
        self
    }
}

enum Inbound {
    Event(Event),
    Down(&'static str),
}

struct Connection {
    sink: WsSink,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    // Cleared by the reader or heartbeat task once the socket is known dead.
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.heartbeat.abort();
    }
}

pub struct WsTransport {
    config: WsTransportConfig,
    conn: Option<Connection>,
    backoff: Backoff,
    connects: u64,
}

impl WsTransport {
    /// Connects, joins and asks for a snapshot. A failure here is returned as is.
    pub async fn connect(config: WsTransportConfig) -> Result<Self, TransportError> {
        let mut transport = Self {
            backoff: Backoff::new(config.backoff),
            config,
            conn: None,
            connects: 0,
        };
        transport.connect_once().await?;
        Ok(transport)
    }

    /// False once a heartbeat or read failure has been observed.
    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_alive)
    }

    /// Number of successful connections so far, the first one included.
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Drops the current socket and reconnects with exponential backoff.
    pub async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.conn = None;
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.connect_once().await {
                Ok(()) => {
                    info!(attempts, url = %self.config.url, "reconnected");
                    self.backoff.reset();
                    return Ok(());
                }
                Err(TransportError::Ws(tungstenite::Error::Url(e))) => {
                    return Err(TransportError::Ws(tungstenite::Error::Url(e)));
                }
                Err(e) => {
                    if self
                        .config
                        .max_reconnect_attempts
                        .is_some_and(|max| attempts >= max)
                    {
                        warn!(attempts, error = %e, "giving up reconnecting");
                        return Err(TransportError::GaveUp { attempts });
                    }
                    let delay = self.backoff.next_delay();
                    debug!(attempts, delay_ms = delay.as_millis() as u64, error = %e, "reconnect failed");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn get_snapshot(&mut self) -> Result<(), TransportError> {
        let text = serde_json::to_string(&ClientMessage::from(ControlMessage::GetSnapshot))?;
        self.send_text(text).await
    }

    async fn connect_once(&mut self) -> Result<(), TransportError> {
        let (stream, _) = connect_async(self.config.url.as_str()).await?;
        let (sink, stream) = stream.split();
        let sink: WsSink = Arc::new(Mutex::new(sink));
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            stream,
            Liveness::new(inbound_tx.clone(), Arc::clone(&alive)),
            pong_tx,
        ));
        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&sink),
            pong_rx,
            Liveness::new(inbound_tx, Arc::clone(&alive)),
            self.config.ping_interval,
            self.config.ping_timeout,
        ));
        self.conn = Some(Connection {
            sink,
            inbound,
            alive,
            reader,
            heartbeat,
        });

        let join = ClientMessage::from(ControlMessage::Join {
            player: self.config.player,
        });
        let snapshot = ClientMessage::from(ControlMessage::GetSnapshot);
        self.send_text(serde_json::to_string(&join)?).await?;
        self.send_text(serde_json::to_string(&snapshot)?).await?;

        self.connects += 1;
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let Some(conn) = self.conn.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        if !conn.is_alive() {
            // A dead socket may still accept writes; never hand it a frame.
            self.conn = None;
            return Err(TransportError::NotConnected);
        }
        let result = conn.sink.lock().await.send(Message::Text(text.into())).await;
        if let Err(e) = result {
            self.conn = None;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_command(&mut self, mut cmd: Command) -> Result<String, TransportError> {
        let cmd_id = ensure_cmd_id(&mut cmd);
        let text = serde_json::to_string(&ClientMessage::Command(cmd))?;

        if let Err(e) = self.send_text(text.clone()).await {
            // Exactly one retry: a single reconnect attempt, then one resend.
            warn!(error = %e, cmd_id = %cmd_id, "send failed; reconnecting once");
            self.conn = None;
            self.connect_once().await?;
            self.send_text(text).await?;
        }
        Ok(cmd_id)
    }

    async fn next_event(&mut self) -> Result<Event, TransportError> {
        loop {
            // A dead connection still yields its buffered events, then `Down`.
            if self.conn.is_none() {
                self.reconnect().await?;
            }
            let Some(conn) = self.conn.as_mut() else {
                continue;
            };
            match conn.inbound.recv().await {
                Some(Inbound::Event(event)) => return Ok(event),
                Some(Inbound::Down(reason)) => {
                    warn!(reason, "connection lost; reconnecting");
                    self.conn = None;
                }
                None => {
                    self.conn = None;
                }
            }
        }
    }
}

// Event delivery plus a one-shot down report, shared by the reader and heartbeat tasks.
struct Liveness {
    inbound: mpsc::UnboundedSender<Inbound>,
    alive: Arc<AtomicBool>,
}

impl Liveness {
    fn new(inbound: mpsc::UnboundedSender<Inbound>, alive: Arc<AtomicBool>) -> Self {
        Self { inbound, alive }
    }

    fn deliver(&self, event: Event) -> bool {
        self.inbound.send(Inbound::Event(event)).is_ok()
    }

    fn down(&self, reason: &'static str) {
        if self.alive.swap(false, Ordering::AcqRel) {
            let _ = self.inbound.send(Inbound::Down(reason));
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    inbound: Liveness,
    pongs: mpsc::UnboundedSender<()>,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match decode_event(text.as_str()) {
                Ok(event) => {
                    if !inbound.deliver(event) {
                        return;
                    }
                }
                Err(e) => debug!(error = %e, "ignoring undecodable server frame"),
            },
            Some(Ok(Message::Pong(_))) => {
                let _ = pongs.send(());
            }
            Some(Ok(Message::Close(_))) | None => break "closed by server",
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(error = %e, "websocket read error");
                break "read error";
            }
        }
    };
    inbound.down(reason);
}

async fn heartbeat_loop(
    sink: WsSink,
    mut pongs: mpsc::UnboundedReceiver<()>,
    inbound: Liveness,
    interval: Duration,
    ping_timeout: Duration,
) {
    if interval.is_zero() {
        return;
    }
    loop {
        tokio::time::sleep(interval).await;
        while pongs.try_recv().is_ok() {}

        if sink.lock().await.send(Message::Ping(Default::default())).await.is_err() {
            inbound.down("ping send failed");
            return;
        }
        match timeout(ping_timeout, pongs.recv()).await {
            Ok(Some(())) => {}
            Ok(None) => return,
            Err(_) => {
                inbound.down("ping timeout");
                return;
            }
        }
    }
}
