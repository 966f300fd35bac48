use crate::domain::Cell;

/// How long a state occupies a piece once entered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    /// Never finishes on its own (idle).
    Unbounded,
    Fixed { ms: i64 },
    /// Proportional to the distance travelled.
    PerCell { cells_per_sec: f64 },
}

impl Timing {
    pub fn duration_ms(self, from: Cell, to: Cell) -> Option<i64> {
        match self {
            Timing::Unbounded => None,
            Timing::Fixed { ms } => Some(ms.max(0)),
            Timing::PerCell { cells_per_sec } => {
                if cells_per_sec <= 0.0 {
                    return Some(0);
                }
                let cells = f64::from(from.distance(to));
                Some((cells * 1000.0 / cells_per_sec).ceil() as i64)
            }
        }
    }
}

/// Timer and position of the state a piece is currently in.
///
/// A piece reports its destination cell from the moment a move starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Physics {
    start_ms: i64,
    to: Cell,
    duration_ms: Option<i64>,
}

impl Physics {
    pub fn at_rest(cell: Cell, start_ms: i64) -> Self {
        Self {
            start_ms,
            to: cell,
            duration_ms: None,
        }
    }

    pub fn reset(&mut self, from: Cell, to: Cell, start_ms: i64, timing: Timing) {
        self.start_ms = start_ms;
        self.to = to;
        self.duration_ms = timing.duration_ms(from, to);
    }

    pub fn cell(&self) -> Cell {
        self.to
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// End time of the state if it has elapsed by `now_ms`.
    pub fn finished_at(&self, now_ms: i64) -> Option<i64> {
        let end = self.start_ms + self.duration_ms?;
        (now_ms >= end).then_some(end)
    }
}
