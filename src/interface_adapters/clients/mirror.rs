// Client-side replica of the board, rebuilt from server events.

use crate::domain::{Color, CommandStatus, Event, EventKind, PieceView, Snapshot};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: CommandStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BoardMirror {
    snapshot: Option<Snapshot>,
    player: Option<Color>,
    results: HashMap<String, CommandOutcome>,
    winner: Option<Color>,
}

impl BoardMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server event into the mirror; returns true if anything changed.
    ///
    /// Snapshots older than the one held are ignored.
    pub fn apply(&mut self, event: &Event) -> bool {
        match event.kind {
            EventKind::StateSnapshot => {
                let Some(snapshot) = event.snapshot() else {
                    return false;
                };
                if self.version().is_some_and(|held| snapshot.version < held) {
                    return false;
                }
                self.snapshot = Some(snapshot);
                true
            }
            EventKind::AssignPlayer => {
                let player = event
                    .payload
                    .get("player")
                    .and_then(|v| serde_json::from_value::<Color>(v.clone()).ok());
                self.player = player;
                player.is_some()
            }
            EventKind::CommandResult => {
                let cmd_id = event.str_field("cmd_id");
                let status = event
                    .payload
                    .get("status")
                    .and_then(|v| serde_json::from_value::<CommandStatus>(v.clone()).ok());
                let (Some(cmd_id), Some(status)) = (cmd_id, status) else {
                    return false;
                };
                let outcome = CommandOutcome {
                    status,
                    reason: event.str_field("reason").map(str::to_string),
                };
                self.results.insert(cmd_id.to_string(), outcome);
                true
            }
            EventKind::GameEnded => {
                self.winner = event.str_field("winner").and_then(Color::from_name);
                true
            }
            _ => false,
        }
    }

    pub fn version(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.version)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn piece(&self, id: &str) -> Option<&PieceView> {
        self.snapshot.as_ref()?.piece(id)
    }

    pub fn player(&self) -> Option<Color> {
        self.player
    }

    pub fn result(&self, cmd_id: &str) -> Option<&CommandOutcome> {
        self.results.get(cmd_id)
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }
}
