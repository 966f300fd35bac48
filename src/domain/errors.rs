// Domain-level errors for game setup and identifiers.

use crate::domain::Cell;
use thiserror::Error;

/// Fatal problems with an initial layout; raised at construction, never recovered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("missing or duplicate king(s): white={white}, black={black}")]
    KingCount { white: usize, black: usize },
    #[error("duplicate initial position at {cell}: {first} and {second}")]
    DuplicateCell {
        cell: Cell,
        first: String,
        second: String,
    },
    #[error("unknown piece code {code:?} at {cell}")]
    UnknownCode { code: String, cell: Cell },
    #[error("piece {piece} at {cell} is outside the {rows}x{cols} board")]
    OutOfBoard {
        piece: String,
        cell: Cell,
        rows: i32,
        cols: i32,
    },
    #[error("layout has no rows")]
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PieceIdError {
    #[error("piece id {0:?} is too short")]
    TooShort(String),
    #[error("piece id {id:?} has unknown type {found:?}")]
    UnknownKind { id: String, found: char },
    #[error("piece id {id:?} has unknown color {found:?}")]
    UnknownColor { id: String, found: char },
}
