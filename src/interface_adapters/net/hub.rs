// Per-game network hub: sessions, command authorization and event fan-out.

use crate::domain::{
    Cell, Clock, Color, Command, CommandKind, CommandStatus, CursorView, Event, EventBus,
    EventKind, MonotonicClock, PieceId, Snapshot,
};
use crate::interface_adapters::protocol::{Rejection, encode_event};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Session {
    color: Option<Color>,
    cursor: Option<Cell>,
}

/// What happened to a command a client sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Cursor updates stay in the hub and never reach the game.
    CursorMoved,
    Queued { cmd_id: Option<String> },
    Rejected {
        cmd_id: Option<String>,
        rejection: Rejection,
    },
    /// The game's command queue is gone.
    Closed,
}

impl Submission {
    /// The `command_result` owed to the sender, if any.
    pub fn result_event(&self, acks: bool, timestamp: i64) -> Option<Event> {
        match self {
            Submission::Queued { cmd_id } if acks => Some(Event::command_result(
                cmd_id.as_deref(),
                CommandStatus::Accepted,
                None,
                timestamp,
            )),
            Submission::Rejected { cmd_id, rejection } => Some(Event::command_result(
                cmd_id.as_deref(),
                CommandStatus::Rejected,
                Some(rejection.reason()),
                timestamp,
            )),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    sessions: RwLock<HashMap<u64, Session>>,
    // Serialized events shared by every connection.
    events_tx: broadcast::Sender<Utf8Bytes>,
    clock: MonotonicClock,
    acks: bool,
}

impl Hub {
    pub fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<Snapshot>,
        clock: MonotonicClock,
        broadcast_capacity: usize,
        acks: bool,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                commands,
                snapshots,
                sessions: RwLock::new(HashMap::new()),
                events_tx,
                clock,
                acks,
            }),
        }
    }

    pub fn acks(&self) -> bool {
        self.inner.acks
    }

    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Utf8Bytes> {
        self.inner.events_tx.subscribe()
    }

    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.inner.commands.clone()
    }

    /// Assigns `requested`, or the side with fewer joined sessions (white on ties).
    pub async fn join(&self, conn_id: u64, requested: Option<Color>) -> Color {
        let mut sessions = self.inner.sessions.write().await;
        let color = requested.unwrap_or_else(|| {
            let count = |color: Color| {
                sessions
                    .iter()
                    .filter(|(id, s)| **id != conn_id && s.color == Some(color))
                    .count()
            };
            if count(Color::Black) < count(Color::White) {
                Color::Black
            } else {
                Color::White
            }
        });
        sessions.entry(conn_id).or_default().color = Some(color);
        info!(conn_id, player = %color, sessions = sessions.len(), "player assigned");
        color
    }

    pub async fn leave(&self, conn_id: u64) {
        if self.inner.sessions.write().await.remove(&conn_id).is_some() {
            debug!(conn_id, "session removed");
        }
    }

    pub async fn color_of(&self, conn_id: u64) -> Option<Color> {
        self.inner
            .sessions
            .read()
            .await
            .get(&conn_id)
            .and_then(|s| s.color)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn cursors(&self) -> Vec<CursorView> {
        let sessions = self.inner.sessions.read().await;
        let mut cursors: Vec<(u64, CursorView)> = sessions
            .iter()
            .filter_map(|(id, s)| {
                Some((
                    *id,
                    CursorView {
                        player: s.color?,
                        cell: s.cursor?,
                    },
                ))
            })
            .collect();
        cursors.sort_by_key(|(id, _)| *id);
        cursors.into_iter().map(|(_, cursor)| cursor).collect()
    }

    /// Latest authoritative snapshot decorated with every session's cursor.
    pub async fn snapshot_event(&self) -> Event {
        let snapshot = self.inner.snapshots.borrow().clone();
        let cursors = self.cursors().await;
        Event::state_snapshot(&snapshot.with_cursors(cursors), self.now_ms())
    }

    /// Authorizes a command from `conn_id` and hands it to the game.
    pub async fn submit(&self, conn_id: u64, cmd: Command) -> Submission {
        if cmd.kind == CommandKind::CursorUpdate {
            if let Some(cell) = cmd.destination() {
                let mut sessions = self.inner.sessions.write().await;
                sessions.entry(conn_id).or_default().cursor = Some(cell);
            }
            return Submission::CursorMoved;
        }

        let cmd_id = cmd.cmd_id.clone();
        let rejected = |rejection| Submission::Rejected {
            cmd_id: cmd_id.clone(),
            rejection,
        };
        let Some(player) = self.color_of(conn_id).await else {
            return rejected(Rejection::NotJoined);
        };
        let piece = match PieceId::parse(&cmd.piece_id) {
            Ok(piece) => piece,
            Err(err) => {
                debug!(conn_id, error = %err, "rejecting command with invalid piece id");
                return rejected(Rejection::InvalidPieceId);
            }
        };
        if piece.color() != player {
            debug!(conn_id, piece = %piece, player = %player, "rejecting command for opponent piece");
            return rejected(Rejection::WrongPlayer);
        }

        match self.inner.commands.try_send(cmd) {
            Ok(()) => Submission::Queued {
                cmd_id: cmd_id.clone(),
            },
            Err(TrySendError::Full(_)) => rejected(Rejection::QueueFull),
            Err(TrySendError::Closed(_)) => Submission::Closed,
        }
    }

    /// Serializes an event once and hands the bytes to every connection.
    pub fn broadcast(&self, event: &Event) {
        match encode_event(event) {
            // No receivers is fine; nobody is connected.
            Ok(text) => {
                let _ = self.inner.events_tx.send(Utf8Bytes::from(text));
            }
            Err(e) => error!(error = ?e, kind = ?event.kind, "failed to serialize event"),
        }
    }

    /// Forwards bus events to every connection.
    ///
    /// Snapshots are decorated with cursors. A significant event arms a forced
    /// snapshot that fires on the next version change unless the game's own
    /// snapshot arrives first. The watch only advances after a tick completes,
    /// so its value when the event arrives may predate the change and is
    /// marked seen.
    pub fn spawn_fanout(&self, mut feed: mpsc::Receiver<Event>) -> JoinHandle<()> {
        let hub = self.clone();
        let mut snapshots = self.inner.snapshots.clone();
        tokio::spawn(async move {
            let mut pending = false;
            loop {
                tokio::select! {
                    biased;
                    event = feed.recv() => {
                        let Some(event) = event else {
                            info!("event feed closed; fan-out exiting");
                            break;
                        };
                        let event = match event.kind {
                            EventKind::StateSnapshot => {
                                pending = false;
                                snapshots.borrow_and_update();
                                hub.decorate(event).await
                            }
                            kind => {
                                if kind.is_significant() {
                                    pending = true;
                                    snapshots.borrow_and_update();
                                }
                                event
                            }
                        };
                        hub.broadcast(&event);
                    }
                    changed = snapshots.changed(), if pending => {
                        pending = false;
                        if changed.is_ok() {
                            snapshots.borrow_and_update();
                            let event = hub.snapshot_event().await;
                            hub.broadcast(&event);
                        }
                    }
                }
            }
        })
    }

    async fn decorate(&self, event: Event) -> Event {
        match event.snapshot() {
            Some(snapshot) => {
                let cursors = self.cursors().await;
                Event::state_snapshot(&snapshot.with_cursors(cursors), event.timestamp)
            }
            None => event,
        }
    }
}

/// Subscribes a bounded channel to every event kind on `bus`.
///
/// The callback never blocks the publisher: when the channel is full the event
/// is dropped and counted.
pub fn attach_feed(bus: &mut EventBus, capacity: usize) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = AtomicU64::new(0);
    bus.subscribe_many(&EventKind::ALL, move |event| {
        if let Err(TrySendError::Full(event)) = tx.try_send(event.clone()) {
            let n = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if n == 1 || n % 100 == 0 {
                warn!(dropped = n, kind = ?event.kind, "event feed full; dropping event");
            }
        }
    });
    rx
}
