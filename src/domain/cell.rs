use serde::{Deserialize, Serialize};
use std::fmt;

/// A board square as `(row, col)`, row 0 being the top (black) edge.
///
/// Serialized as a 2-element array so it matches the wire format of
/// command params and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell(pub i32, pub i32);

impl Cell {
    pub fn row(self) -> i32 {
        self.0
    }

    pub fn col(self) -> i32 {
        self.1
    }

    /// Number of king steps between two cells.
    pub fn distance(self, other: Cell) -> u32 {
        let dr = (self.0 - other.0).unsigned_abs();
        let dc = (self.1 - other.1).unsigned_abs();
        dr.max(dc)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((row, col): (i32, i32)) -> Self {
        Self(row, col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}
