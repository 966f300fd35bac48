// Per-game move log, fed only by `piece_moved` events.

use crate::domain::{Cell, Color, Event, EventBus, EventKind, PieceKind, SubscriptionId};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Game time as `MM:SS.mmm`.
    pub time: String,
    pub notation: String,
}

#[derive(Debug, Default)]
struct Lines {
    white: Vec<HistoryEntry>,
    black: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct MoveHistory {
    lines: Arc<Mutex<Lines>>,
}

impl MoveHistory {
    pub fn attach(bus: &mut EventBus) -> (Self, SubscriptionId) {
        let history = Self::default();
        let sink = history.clone();
        let id = bus.subscribe(EventKind::PieceMoved, move |event| sink.on_piece_moved(event));
        (history, id)
    }

    pub fn entries(&self, color: Color) -> Vec<HistoryEntry> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        match color {
            Color::White => lines.white.clone(),
            Color::Black => lines.black.clone(),
        }
    }

    pub fn len(&self) -> usize {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.white.len() + lines.black.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn on_piece_moved(&self, event: &Event) {
        let player = event
            .str_field("player")
            .and_then(Color::from_name)
            .unwrap_or(Color::White);
        let piece = event
            .str_field("piece")
            .and_then(|p| p.chars().next())
            .and_then(PieceKind::from_letter);
        let capture = event
            .payload
            .get("capture")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let millis = event
            .payload
            .get("timestamp_ms")
            .and_then(|v| v.as_i64())
            .unwrap_or(event.timestamp);

        let notation = match (piece, event.cell_field("from"), event.cell_field("to")) {
            (Some(piece), Some(from), Some(to)) => algebraic(piece, from, to, capture),
            _ => None,
        };
        let Some(notation) = notation else {
            debug!(payload = ?event.payload, "ignoring move outside the notation board");
            return;
        };

        let entry = HistoryEntry {
            time: format_clock(millis),
            notation,
        };
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        match player {
            Color::White => lines.white.push(entry),
            Color::Black => lines.black.push(entry),
        }
    }
}

pub fn format_clock(millis: i64) -> String {
    let millis = millis.max(0);
    format!(
        "{:02}:{:02}.{:03}",
        millis / 60_000,
        (millis % 60_000) / 1_000,
        millis % 1_000
    )
}

/// Row 0 is rank 8 and column 0 is file `a`; `None` off the 8x8 board.
pub fn square(cell: Cell) -> Option<String> {
    if !(0..8).contains(&cell.row()) || !(0..8).contains(&cell.col()) {
        return None;
    }
    let file = char::from(b'a' + cell.col() as u8);
    Some(format!("{file}{}", 8 - cell.row()))
}

pub fn algebraic(piece: PieceKind, from: Cell, to: Cell, capture: bool) -> Option<String> {
    let from_sq = square(from)?;
    let to_sq = square(to)?;
    let notation = match (piece, capture) {
        (PieceKind::Pawn, true) => format!("{}x{to_sq}", &from_sq[..1]),
        (PieceKind::Pawn, false) => to_sq,
        (_, true) => format!("{}x{to_sq}", piece.letter()),
        (_, false) => format!("{}{to_sq}", piece.letter()),
    };
    Some(notation)
}
