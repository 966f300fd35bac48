// Initial piece placement: parsing and validation.

use crate::domain::{Board, Cell, Color, PieceId, PieceKind, SetupError};
use std::collections::{BTreeMap, HashMap};

/// Standard chess opening; black on rows 0-1, white on rows 6-7.
pub const STANDARD_LAYOUT: &str = "\
RB,NB,BB,QB,KB,BB,NB,RB
PB,PB,PB,PB,PB,PB,PB,PB
,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
PW,PW,PW,PW,PW,PW,PW,PW
RW,NW,BW,QW,KW,BW,NW,RW
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub id: PieceId,
    pub cell: Cell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub board: Board,
    pub placements: Vec<Placement>,
}

impl Layout {
    /// Parses a comma-separated grid of `<TYPE><COLOR>` codes; blank cells are empty.
    ///
    /// Ids are numbered per code from 1 in reading order. The grid is not
    /// validated here, see [`Layout::validate`].
    pub fn parse(csv: &str) -> Result<Self, SetupError> {
        let rows: Vec<&str> = csv
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if rows.is_empty() {
            return Err(SetupError::Empty);
        }

        let mut counters: HashMap<(PieceKind, Color), u32> = HashMap::new();
        let mut placements = Vec::new();
        let mut cols = 0;
        for (r, line) in rows.iter().enumerate() {
            let codes: Vec<&str> = line.split(',').map(str::trim).collect();
            cols = cols.max(codes.len() as i32);
            for (c, code) in codes.into_iter().enumerate() {
                if code.is_empty() {
                    continue;
                }
                let cell = Cell(r as i32, c as i32);
                let (kind, color) = decode(code).ok_or_else(|| SetupError::UnknownCode {
                    code: code.to_string(),
                    cell,
                })?;
                let n = counters.entry((kind, color)).or_insert(0);
                *n += 1;
                placements.push(Placement {
                    id: PieceId::new(kind, color, *n),
                    cell,
                });
            }
        }

        Ok(Self {
            board: Board::new(rows.len() as i32, cols),
            placements,
        })
    }

    pub fn standard() -> Result<Self, SetupError> {
        Self::parse(STANDARD_LAYOUT)
    }

    pub fn new(board: Board, placements: Vec<Placement>) -> Self {
        Self { board, placements }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let mut seen: BTreeMap<Cell, &PieceId> = BTreeMap::new();
        for placement in &self.placements {
            if !self.board.contains(placement.cell) {
                return Err(SetupError::OutOfBoard {
                    piece: placement.id.to_string(),
                    cell: placement.cell,
                    rows: self.board.rows(),
                    cols: self.board.cols(),
                });
            }
            if let Some(first) = seen.insert(placement.cell, &placement.id) {
                return Err(SetupError::DuplicateCell {
                    cell: placement.cell,
                    first: first.to_string(),
                    second: placement.id.to_string(),
                });
            }
        }

        let kings = |color: Color| {
            self.placements
                .iter()
                .filter(|p| p.id.kind() == PieceKind::King && p.id.color() == color)
                .count()
        };
        let (white, black) = (kings(Color::White), kings(Color::Black));
        if white != 1 || black != 1 {
            return Err(SetupError::KingCount { white, black });
        }
        Ok(())
    }
}

fn decode(code: &str) -> Option<(PieceKind, Color)> {
    let mut chars = code.chars();
    let kind = PieceKind::from_letter(chars.next()?)?;
    let color = Color::from_letter(chars.next()?.to_ascii_uppercase())?;
    if chars.next().is_some() {
        return None;
    }
    Some((kind, color))
}
