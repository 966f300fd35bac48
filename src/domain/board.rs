// Board dimensions and the per-tick cell -> pieces index.

use crate::domain::{Cell, Piece, PieceId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    rows: i32,
    cols: i32,
}

impl Board {
    pub fn new(rows: i32, cols: i32) -> Self {
        Self { rows, cols }
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (0..self.rows).contains(&cell.row()) && (0..self.cols).contains(&cell.col())
    }
}

/// Cells mapped to the pieces currently reporting them.
///
/// Always rebuilt from scratch from live piece positions, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    cells: BTreeMap<Cell, Vec<PieceId>>,
}

impl Occupancy {
    pub fn rebuild<'a>(pieces: impl IntoIterator<Item = &'a Piece>) -> Self {
        let mut cells: BTreeMap<Cell, Vec<PieceId>> = BTreeMap::new();
        for piece in pieces {
            cells.entry(piece.cell()).or_default().push(piece.id().clone());
        }
        Self { cells }
    }

    pub fn at(&self, cell: Cell) -> &[PieceId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cells holding two or more pieces, in row-major order.
    pub fn contested(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .filter(|(_, ids)| ids.len() >= 2)
            .map(|(cell, _)| *cell)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
