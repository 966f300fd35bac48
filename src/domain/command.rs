// Commands addressed to a single piece. Immutable once created.

use crate::domain::Cell;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Move,
    Jump,
    Select,
    CursorUpdate,
    Idle,
}

/// A command parameter: a grid cell (2-element array) or a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Cell(Cell),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<Cell> for Param {
    fn from(cell: Cell) -> Self {
        Param::Cell(cell)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Client-side timestamp in milliseconds.
    pub timestamp: i64,
    pub piece_id: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(default)]
    pub params: Vec<Param>,
    /// Opaque id echoed back in `command_result`.
    #[serde(default)]
    pub cmd_id: Option<String>,
}

impl Command {
    pub fn new(timestamp: i64, piece_id: impl Into<String>, kind: CommandKind, params: Vec<Param>) -> Self {
        Self {
            timestamp,
            piece_id: piece_id.into(),
            kind,
            params,
            cmd_id: None,
        }
    }

    pub fn with_cmd_id(mut self, cmd_id: impl Into<String>) -> Self {
        self.cmd_id = Some(cmd_id.into());
        self
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.params.iter().filter_map(|param| match param {
            Param::Cell(cell) => Some(*cell),
            _ => None,
        })
    }

    /// The last cell param: the target of a move or a cursor position.
    pub fn destination(&self) -> Option<Cell> {
        self.cells().last()
    }

    /// True when the caller supplied both a from and a to cell.
    pub fn has_explicit_from_to(&self) -> bool {
        self.cells().nth(1).is_some()
    }
}
