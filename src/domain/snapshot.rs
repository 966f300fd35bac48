// Read-only board view shared by the server snapshot and the client mirror.

use crate::domain::{Cell, Color, StateName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceView {
    pub id: String,
    pub cell: Cell,
    pub color: Color,
    pub state: StateName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorView {
    pub player: Color,
    pub cell: Cell,
}

/// Every piece plus player cursors, tagged with the state version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub pieces: Vec<PieceView>,
    #[serde(default)]
    pub cursors: Vec<CursorView>,
}

impl Snapshot {
    pub fn piece(&self, id: &str) -> Option<&PieceView> {
        self.pieces.iter().find(|piece| piece.id == id)
    }

    pub fn with_cursors(mut self, cursors: Vec<CursorView>) -> Self {
        self.cursors = cursors;
        self
    }
}
