// Per-game material score, fed only by `capture` events.

use crate::domain::{Color, Event, EventBus, EventKind, PieceKind, SubscriptionId};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub white: u32,
    pub black: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    totals: Arc<Mutex<Totals>>,
}

impl ScoreBoard {
    /// Creates a score board and subscribes it to `capture` on `bus`.
    pub fn attach(bus: &mut EventBus) -> (Self, SubscriptionId) {
        let board = Self::default();
        let sink = board.clone();
        let id = bus.subscribe(EventKind::Capture, move |event| sink.on_capture(event));
        (board, id)
    }

    pub fn score(&self, color: Color) -> u32 {
        let totals = self.totals();
        match color {
            Color::White => totals.white,
            Color::Black => totals.black,
        }
    }

    pub fn totals(&self) -> Totals {
        *self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_capture(&self, event: &Event) {
        let player = event.str_field("player").and_then(Color::from_name);
        let piece = event
            .str_field("piece")
            .and_then(|p| p.chars().next())
            .and_then(PieceKind::from_letter);
        let (Some(player), Some(piece)) = (player, piece) else {
            debug!(payload = ?event.payload, "ignoring malformed capture event");
            return;
        };

        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        match player {
            Color::White => totals.white += piece.value(),
            Color::Black => totals.black += piece.value(),
        }
    }
}
