use crate::domain::{Cell, Color, Occupancy, Piece, PieceId, PieceKind};
use std::cmp::Ordering;

/// What happened to one losing occupant of a contested cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Same-color overlap: the loser is removed without a capture.
    Overlap { cell: Cell, removed: PieceId },
    Capture {
        cell: Cell,
        winner: Color,
        removed: PieceId,
        piece: PieceKind,
    },
}

impl Resolution {
    pub fn removed(&self) -> &PieceId {
        match self {
            Resolution::Overlap { removed, .. } | Resolution::Capture { removed, .. } => removed,
        }
    }
}

/// Settles every cell held by two or more pieces, in row-major order.
///
/// The occupancy index is rebuilt after each cell that loses a piece.
pub fn resolve_collisions(pieces: &mut Vec<Piece>, occupancy: &mut Occupancy) -> Vec<Resolution> {
    let mut resolutions = Vec::new();

    for cell in occupancy.contested() {
        let occupants: Vec<usize> = occupancy
            .at(cell)
            .iter()
            .filter_map(|id| pieces.iter().position(|p| p.id() == id))
            .collect();
        let Some(winner) = pick_winner(pieces, &occupants) else {
            continue;
        };

        let mut removed = Vec::new();
        for &idx in &occupants {
            if idx == winner {
                continue;
            }
            let (champion, other) = (&pieces[winner], &pieces[idx]);
            // Airborne pieces neither capture nor get captured.
            if champion.is_airborne() || other.is_airborne() {
                continue;
            }

            let resolution = if other.color() == champion.color() {
                Resolution::Overlap {
                    cell,
                    removed: other.id().clone(),
                }
            } else {
                Resolution::Capture {
                    cell,
                    winner: champion.color(),
                    removed: other.id().clone(),
                    piece: other.kind(),
                }
            };
            removed.push(other.id().clone());
            resolutions.push(resolution);
        }

        if !removed.is_empty() {
            pieces.retain(|p| !removed.contains(p.id()));
            *occupancy = Occupancy::rebuild(pieces.iter());
        }
    }

    resolutions
}

// Moving pieces beat idle ones; then the most recent command, then the most
// recent physics start. Exact ties go to the greater piece id.
fn pick_winner(pieces: &[Piece], occupants: &[usize]) -> Option<usize> {
    let any_moving = occupants.iter().any(|&idx| !pieces[idx].is_idle());
    occupants
        .iter()
        .copied()
        .filter(|&idx| !any_moving || !pieces[idx].is_idle())
        .max_by(|&a, &b| rank(&pieces[a], &pieces[b]))
}

fn rank(a: &Piece, b: &Piece) -> Ordering {
    (a.last_command_ms(), a.physics_start_ms())
        .cmp(&(b.last_command_ms(), b.physics_start_ms()))
        .then_with(|| a.id().cmp(b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Board, Command, CommandKind, PhysicsTuning, StateGraph};
    use std::sync::Arc;

    fn piece(raw: &str, cell: Cell) -> Piece {
        let graph = Arc::new(StateGraph::standard(&PhysicsTuning::default()));
        let mut piece = Piece::new(PieceId::parse(raw).expect("expected valid id"), cell, graph);
        piece.reset(0);
        piece
    }

    fn command(piece: &mut Piece, kind: CommandKind, to: Cell, ts: i64) {
        let cmd = Command::new(ts, piece.id().as_str(), kind, vec![to.into()]);
        piece
            .on_command(&cmd, &Board::new(8, 8), &Occupancy::default(), ts)
            .expect("expected command to be applied");
    }

    #[test]
    fn when_moving_piece_lands_on_idle_opponent_then_opponent_is_captured() {
        let mut rook = piece("RW_1", Cell(7, 0));
        command(&mut rook, CommandKind::Move, Cell(4, 0), 10);
        let mut pieces = vec![rook, piece("PB_1", Cell(4, 0))];
        let mut occupancy = Occupancy::rebuild(&pieces);

        let resolutions = resolve_collisions(&mut pieces, &mut occupancy);

        assert_eq!(
            resolutions,
            vec![Resolution::Capture {
                cell: Cell(4, 0),
                winner: Color::White,
                removed: PieceId::parse("PB_1").expect("expected valid id"),
                piece: PieceKind::Pawn,
            }]
        );
        assert_eq!(pieces.len(), 1);
        assert_eq!(occupancy.at(Cell(4, 0)).len(), 1);
    }

    #[test]
    fn when_both_pieces_move_then_most_recent_command_wins() {
        let mut early = piece("RW_1", Cell(4, 7));
        let mut late = piece("RB_1", Cell(4, 0));
        command(&mut early, CommandKind::Move, Cell(4, 4), 100);
        command(&mut late, CommandKind::Move, Cell(4, 4), 200);
        let mut pieces = vec![early, late];
        let mut occupancy = Occupancy::rebuild(&pieces);

        let resolutions = resolve_collisions(&mut pieces, &mut occupancy);

        assert_eq!(resolutions.len(), 1);
        assert_eq!(pieces[0].id().as_str(), "RB_1");
    }

    #[test]
    fn when_timestamps_tie_then_greater_piece_id_wins() {
        let mut a = piece("RW_1", Cell(4, 7));
        let mut b = piece("RW_2", Cell(4, 0));
        command(&mut a, CommandKind::Move, Cell(4, 4), 100);
        command(&mut b, CommandKind::Move, Cell(4, 4), 100);
        let mut pieces = vec![a, b];
        let mut occupancy = Occupancy::rebuild(&pieces);

        let resolutions = resolve_collisions(&mut pieces, &mut occupancy);

        assert!(matches!(resolutions.as_slice(), [Resolution::Overlap { .. }]));
        assert_eq!(pieces[0].id().as_str(), "RW_2");
    }

    #[test]
    fn when_occupant_is_jumping_then_nobody_is_removed() {
        let mut rook = piece("RW_1", Cell(7, 0));
        let mut pawn = piece("PB_1", Cell(4, 0));
        command(&mut rook, CommandKind::Move, Cell(4, 0), 10);
        command(&mut pawn, CommandKind::Jump, Cell(4, 0), 5);
        let mut pieces = vec![rook, pawn];
        let mut occupancy = Occupancy::rebuild(&pieces);

        assert!(resolve_collisions(&mut pieces, &mut occupancy).is_empty());
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn when_knight_is_mid_move_then_it_cannot_capture() {
        let mut knight = piece("NW_1", Cell(7, 1));
        command(&mut knight, CommandKind::Move, Cell(5, 2), 10);
        let mut pieces = vec![knight, piece("PB_1", Cell(5, 2))];
        let mut occupancy = Occupancy::rebuild(&pieces);

        assert!(resolve_collisions(&mut pieces, &mut occupancy).is_empty());
        assert_eq!(pieces.len(), 2);
    }
}
