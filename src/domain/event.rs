// Events: the sole unit crossing the bus and the wire.

use crate::domain::{Cell, Color, PieceKind, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub type Payload = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GameStarted,
    GameEnded,
    PieceMoved,
    Capture,
    SoundPlay,
    StateSnapshot,
    AssignPlayer,
    CommandResult,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::GameStarted,
        EventKind::GameEnded,
        EventKind::PieceMoved,
        EventKind::Capture,
        EventKind::SoundPlay,
        EventKind::StateSnapshot,
        EventKind::AssignPlayer,
        EventKind::CommandResult,
    ];

    /// Material changes that force a fresh snapshot to every client.
    pub fn is_significant(self) -> bool {
        matches!(self, EventKind::PieceMoved | EventKind::Capture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub payload: Payload,
    pub timestamp: i64,
}

impl Event {
    pub fn new(kind: EventKind, payload: Payload, timestamp: i64) -> Self {
        Self {
            kind,
            payload,
            timestamp,
        }
    }

    pub fn piece_moved(piece: PieceKind, from: Cell, to: Cell, player: Color, timestamp: i64) -> Self {
        Self::new(
            EventKind::PieceMoved,
            object(json!({
                "piece": piece.letter().to_string(),
                "from": from,
                "to": to,
                "player": player.name(),
                "capture": false,
                "timestamp_ms": timestamp,
            })),
            timestamp,
        )
    }

    pub fn capture(player: Color, piece: PieceKind, timestamp: i64) -> Self {
        Self::new(
            EventKind::Capture,
            object(json!({
                "player": player.name(),
                "piece": piece.letter().to_string(),
            })),
            timestamp,
        )
    }

    pub fn sound_play(capture: bool, timestamp: i64) -> Self {
        Self::new(
            EventKind::SoundPlay,
            object(json!({ "capture": capture })),
            timestamp,
        )
    }

    pub fn state_snapshot(snapshot: &Snapshot, timestamp: i64) -> Self {
        let payload = serde_json::to_value(snapshot)
            .map(object)
            .unwrap_or_default();
        Self::new(EventKind::StateSnapshot, payload, timestamp)
    }

    pub fn assign_player(player: Color, timestamp: i64) -> Self {
        Self::new(
            EventKind::AssignPlayer,
            object(json!({ "player": player })),
            timestamp,
        )
    }

    pub fn command_result(
        cmd_id: Option<&str>,
        status: CommandStatus,
        reason: Option<&str>,
        timestamp: i64,
    ) -> Self {
        let mut payload = object(json!({ "cmd_id": cmd_id, "status": status }));
        if let Some(reason) = reason {
            payload.insert("reason".to_string(), Value::from(reason));
        }
        Self::new(EventKind::CommandResult, payload, timestamp)
    }

    pub fn game_started(message: &str, timestamp: i64) -> Self {
        Self::new(
            EventKind::GameStarted,
            object(json!({ "message": message })),
            timestamp,
        )
    }

    pub fn game_ended(winner: Color, reason: &str, timestamp: i64) -> Self {
        Self::new(
            EventKind::GameEnded,
            object(json!({ "winner": winner.name(), "reason": reason })),
            timestamp,
        )
    }

    /// Decodes a `state_snapshot` payload into the shared view type.
    pub fn snapshot(&self) -> Option<Snapshot> {
        if self.kind != EventKind::StateSnapshot {
            return None;
        }
        serde_json::from_value(Value::Object(self.payload.clone())).ok()
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn cell_field(&self, key: &str) -> Option<Cell> {
        self.payload
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
