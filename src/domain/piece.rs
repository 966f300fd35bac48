// Piece identity and the per-piece command/physics contract.

use crate::domain::errors::PieceIdError;
use crate::domain::physics::Physics;
use crate::domain::state::{StateGraph, StateName, Trigger};
use crate::domain::{Board, Cell, Command, CommandKind, Occupancy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "W")]
    White,
    #[serde(rename = "B")]
    Black,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    pub fn letter(self) -> char {
        match self {
            Color::White => 'W',
            Color::Black => 'B',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'W' => Some(Color::White),
            'B' => Some(Color::Black),
            _ => None,
        }
    }

    /// Long name used by move/capture payloads ("white" / "black").
    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "white" => Some(Color::White),
            "black" => Some(Color::Black),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceKind {
    pub fn letter(self) -> char {
        match self {
            PieceKind::King => 'K',
            PieceKind::Queen => 'Q',
            PieceKind::Rook => 'R',
            PieceKind::Bishop => 'B',
            PieceKind::Knight => 'N',
            PieceKind::Pawn => 'P',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'K' => Some(PieceKind::King),
            'Q' => Some(PieceKind::Queen),
            'R' => Some(PieceKind::Rook),
            'B' => Some(PieceKind::Bishop),
            'N' => Some(PieceKind::Knight),
            'P' => Some(PieceKind::Pawn),
            _ => None,
        }
    }

    /// Material value credited to the capturing side.
    pub fn value(self) -> u32 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight | PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }
}

/// Identifier of the form `<TYPE><COLOR>_<n>`, e.g. `"PW_3"`.
///
/// The type and color are decoded once at parse time; ordering and equality
/// follow the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceId {
    raw: String,
    kind: PieceKind,
    color: Color,
}

impl PieceId {
    pub fn new(kind: PieceKind, color: Color, n: u32) -> Self {
        Self {
            raw: format!("{}{}_{}", kind.letter(), color.letter(), n),
            kind,
            color,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PieceIdError> {
        let mut chars = raw.chars();
        let (Some(kind_letter), Some(color_letter)) = (chars.next(), chars.next()) else {
            return Err(PieceIdError::TooShort(raw.to_string()));
        };
        let kind = PieceKind::from_letter(kind_letter).ok_or_else(|| PieceIdError::UnknownKind {
            id: raw.to_string(),
            found: kind_letter,
        })?;
        let color = Color::from_letter(color_letter).ok_or_else(|| PieceIdError::UnknownColor {
            id: raw.to_string(),
            found: color_letter,
        })?;
        Ok(Self {
            raw: raw.to_string(),
            kind,
            color,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Why an idle piece refused a command; its cell and state are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Busy,
    MissingDestination,
    OutOfBoard(Cell),
    FriendlyOccupied(Cell),
}

/// A piece on the board: identity, current state, and last-command timestamp.
pub struct Piece {
    id: PieceId,
    graph: Arc<StateGraph>,
    state: StateName,
    physics: Physics,
    last_command_ms: i64,
}

impl Piece {
    pub fn new(id: PieceId, cell: Cell, graph: Arc<StateGraph>) -> Self {
        Self {
            id,
            graph,
            state: StateName::Idle,
            physics: Physics::at_rest(cell, 0),
            last_command_ms: -1,
        }
    }

    pub fn id(&self) -> &PieceId {
        &self.id
    }

    pub fn color(&self) -> Color {
        self.id.color
    }

    pub fn kind(&self) -> PieceKind {
        self.id.kind
    }

    pub fn cell(&self) -> Cell {
        self.physics.cell()
    }

    pub fn state(&self) -> StateName {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == StateName::Idle
    }

    /// -1 until the piece accepts its first command.
    pub fn last_command_ms(&self) -> i64 {
        self.last_command_ms
    }

    pub fn physics_start_ms(&self) -> i64 {
        self.physics.start_ms()
    }

    /// Jumping pieces, and knights mid-move, can neither capture nor be captured.
    pub fn is_airborne(&self) -> bool {
        self.state == StateName::Jump
            || (self.id.kind == PieceKind::Knight && self.state == StateName::Move)
    }

    /// Puts the piece back into idle at its current cell with the timer origin at `now_ms`.
    pub fn reset(&mut self, now_ms: i64) {
        self.state = StateName::Idle;
        self.physics = Physics::at_rest(self.physics.cell(), now_ms);
    }

    /// Advances the timer and follows every `done` transition whose state has elapsed.
    pub fn update(&mut self, now_ms: i64) {
        // Bounded by the graph size so a zero-length cycle cannot spin.
        for _ in 0..StateName::ALL.len() {
            let Some(ended_at) = self.physics.finished_at(now_ms) else {
                return;
            };
            let Some(next) = self.graph.next(self.state, Trigger::Done) else {
                return;
            };
            let cell = self.physics.cell();
            self.enter(next, cell, cell, ended_at);
        }
    }

    /// Applies a command to an idle piece.
    ///
    /// On success the piece's cell is either unchanged or exactly the
    /// command's destination.
    pub fn on_command(
        &mut self,
        cmd: &Command,
        board: &Board,
        occupancy: &Occupancy,
        now_ms: i64,
    ) -> Result<(), Refusal> {
        if !self.is_idle() {
            return Err(Refusal::Busy);
        }

        let from = self.cell();
        match cmd.kind {
            CommandKind::Move => {
                let to = cmd.destination().ok_or(Refusal::MissingDestination)?;
                if !board.contains(to) {
                    return Err(Refusal::OutOfBoard(to));
                }
                let friendly = occupancy
                    .at(to)
                    .iter()
                    .any(|other| other != &self.id && other.color() == self.id.color);
                if friendly {
                    return Err(Refusal::FriendlyOccupied(to));
                }
                if let Some(next) = self.graph.next(self.state, Trigger::Move) {
                    self.enter(next, from, to, now_ms);
                }
            }
            CommandKind::Jump => {
                if let Some(next) = self.graph.next(self.state, Trigger::Jump) {
                    self.enter(next, from, from, now_ms);
                }
            }
            CommandKind::Select | CommandKind::Idle | CommandKind::CursorUpdate => {}
        }

        self.last_command_ms = cmd.timestamp;
        Ok(())
    }

    fn enter(&mut self, next: StateName, from: Cell, to: Cell, start_ms: i64) {
        let timing = self.graph.timing(next);
        self.state = next;
        self.physics.reset(from, to, start_ms, timing);
    }
}

impl fmt::Debug for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Piece")
            .field("id", &self.id.raw)
            .field("state", &self.state)
            .field("cell", &self.cell())
            .field("last_command_ms", &self.last_command_ms)
            .finish()
    }
}
