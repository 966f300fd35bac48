// The game authority: owns pieces, board, command queue and state version.

use super::collisions::{Resolution, resolve_collisions};
use crate::domain::{
    Board, Clock, Color, Command, CommandKind, Event, EventBus, Layout, Occupancy, Piece,
    PieceKind, PieceView, PhysicsTuning, SetupError, Snapshot, StateGraph,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const GAME_START_MESSAGE: &str = "Game Start!";
pub const KING_CAPTURED: &str = "king captured";

pub struct Game {
    board: Board,
    pieces: Vec<Piece>,
    occupancy: Occupancy,
    commands: mpsc::Receiver<Command>,
    // Latest command per busy piece.
    deferred: BTreeMap<String, Command>,
    bus: EventBus,
    clock: Box<dyn Clock>,
    state_version: u64,
    snapshot_dirty: bool,
    last_tick_ms: Option<i64>,
    started: bool,
    finished: bool,
}

impl Game {
    /// Builds a game from a validated layout. Setup errors are fatal.
    pub fn new(
        layout: Layout,
        tuning: &PhysicsTuning,
        clock: Box<dyn Clock>,
        commands: mpsc::Receiver<Command>,
    ) -> Result<Self, SetupError> {
        layout.validate()?;
        Ok(Self::new_unchecked(layout, tuning, clock, commands))
    }

    /// Skips layout validation; for sandboxes and partial boards in tests.
    pub fn new_unchecked(
        layout: Layout,
        tuning: &PhysicsTuning,
        clock: Box<dyn Clock>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let graph = Arc::new(StateGraph::standard(tuning));
        let pieces: Vec<Piece> = layout
            .placements
            .into_iter()
            .map(|placement| Piece::new(placement.id, placement.cell, Arc::clone(&graph)))
            .collect();
        let occupancy = Occupancy::rebuild(&pieces);

        Self {
            board: layout.board,
            pieces,
            occupancy,
            commands,
            deferred: BTreeMap::new(),
            bus: EventBus::new(),
            clock,
            state_version: 0,
            snapshot_dirty: true,
            last_tick_ms: None,
            started: false,
            finished: false,
        }
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, id: &str) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id().as_str() == id)
    }

    pub fn state_version(&self) -> u64 {
        self.state_version
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn last_tick_ms(&self) -> Option<i64> {
        self.last_tick_ms
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Resets every piece's timers at `now_ms` and announces the start.
    pub fn start(&mut self, now_ms: i64) {
        for piece in &mut self.pieces {
            piece.reset(now_ms);
        }
        self.started = true;
        info!(pieces = self.pieces.len(), "game started");
        self.bus.publish(&Event::game_started(GAME_START_MESSAGE, now_ms));
    }

    /// Runs one authoritative step.
    pub fn tick(&mut self) {
        let now = self.tick_time();
        if !self.started {
            self.start(now);
        }

        self.occupancy = Occupancy::rebuild(&self.pieces);

        while let Ok(cmd) = self.commands.try_recv() {
            self.process(cmd, now);
        }

        for piece in &mut self.pieces {
            piece.update(now);
        }

        self.replay_deferred(now);

        self.occupancy = Occupancy::rebuild(&self.pieces);

        let resolutions = resolve_collisions(&mut self.pieces, &mut self.occupancy);
        self.publish_resolutions(&resolutions, now);
        self.check_game_over(&resolutions, now);

        if self.snapshot_dirty {
            let snapshot = self.snapshot();
            self.bus.publish(&Event::state_snapshot(&snapshot, now));
            self.snapshot_dirty = false;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.state_version,
            pieces: self
                .pieces
                .iter()
                .map(|piece| PieceView {
                    id: piece.id().to_string(),
                    cell: piece.cell(),
                    color: piece.color(),
                    state: piece.state(),
                })
                .collect(),
            cursors: Vec::new(),
        }
    }

    // Strictly increasing tick times: an identical (or earlier) reading
    // pushes the clock epoch back until it is one past the previous tick.
    fn tick_time(&mut self) -> i64 {
        let mut now = self.clock.now_ms();
        if let Some(prev) = self.last_tick_ms {
            if now <= prev {
                self.clock.rewind(prev - now + 1);
                now = self.clock.now_ms();
            }
        }
        self.last_tick_ms = Some(now);
        now
    }

    fn process(&mut self, cmd: Command, now: i64) {
        if cmd.kind == CommandKind::CursorUpdate {
            return;
        }
        let Some(idx) = self.index_of(&cmd.piece_id) else {
            debug!(piece = %cmd.piece_id, kind = ?cmd.kind, "dropping command for unknown piece");
            return;
        };
        if !self.pieces[idx].is_idle() {
            debug!(piece = %cmd.piece_id, state = ?self.pieces[idx].state(), "deferring command");
            self.deferred.insert(cmd.piece_id.clone(), cmd);
            self.bus.publish(&Event::sound_play(false, now));
            return;
        }
        self.apply(idx, &cmd, now);
    }

    fn apply(&mut self, idx: usize, cmd: &Command, now: i64) {
        let piece = &mut self.pieces[idx];
        let before = piece.cell();
        if let Err(refusal) = piece.on_command(cmd, &self.board, &self.occupancy, now) {
            debug!(piece = %cmd.piece_id, ?refusal, "command refused");
            return;
        }
        let after = piece.cell();
        let (kind, color) = (piece.kind(), piece.color());

        if before != after || cmd.has_explicit_from_to() {
            self.bump();
            self.bus
                .publish(&Event::piece_moved(kind, before, after, color, now));
        }
        self.bus.publish(&Event::sound_play(false, now));
    }

    fn replay_deferred(&mut self, now: i64) {
        let ready: Vec<String> = self
            .deferred
            .keys()
            .filter(|id| self.piece(id).is_none_or(Piece::is_idle))
            .cloned()
            .collect();
        if ready.is_empty() {
            return;
        }

        self.occupancy = Occupancy::rebuild(&self.pieces);
        for id in ready {
            let Some(cmd) = self.deferred.remove(&id) else {
                continue;
            };
            match self.index_of(&id) {
                Some(idx) => self.apply(idx, &cmd, now),
                None => debug!(piece = %id, "dropping deferred command for removed piece"),
            }
        }
    }

    fn publish_resolutions(&mut self, resolutions: &[Resolution], now: i64) {
        for resolution in resolutions {
            self.deferred.remove(resolution.removed().as_str());
            self.bump();
            match resolution {
                Resolution::Overlap { cell, removed } => {
                    debug!(piece = %removed, %cell, "removed overlapping friendly piece");
                }
                Resolution::Capture {
                    cell,
                    winner,
                    removed,
                    piece,
                } => {
                    info!(piece = %removed, %cell, winner = %winner, "piece captured");
                    self.bus.publish(&Event::capture(*winner, *piece, now));
                    self.bus.publish(&Event::sound_play(true, now));
                }
            }
        }
    }

    fn check_game_over(&mut self, resolutions: &[Resolution], now: i64) {
        if self.finished {
            return;
        }
        let kings: Vec<Color> = self
            .pieces
            .iter()
            .filter(|p| p.kind() == PieceKind::King)
            .map(Piece::color)
            .collect();
        if kings.len() >= 2 {
            return;
        }

        let last_capturer = resolutions.iter().rev().find_map(|r| match r {
            Resolution::Capture { winner, .. } => Some(*winner),
            Resolution::Overlap { .. } => None,
        });
        let winner = kings
            .first()
            .copied()
            .or(last_capturer)
            .unwrap_or(Color::White);

        self.finished = true;
        info!(winner = %winner, "game ended");
        self.bus
            .publish(&Event::game_ended(winner, KING_CAPTURED, now));
    }

    fn bump(&mut self) {
        self.state_version += 1;
        self.snapshot_dirty = true;
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.pieces.iter().position(|p| p.id().as_str() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, EventKind, ManualClock, StateName};
    use std::sync::Mutex;

    const TUNING: PhysicsTuning = PhysicsTuning {
        move_cells_per_sec: 1.0,
        jump_ms: 100,
        long_rest_ms: 200,
        short_rest_ms: 50,
    };

    struct Harness {
        game: Game,
        clock: ManualClock,
        tx: mpsc::Sender<Command>,
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl Harness {
        fn new(csv: &str) -> Self {
            let layout = Layout::parse(csv).expect("expected layout to parse");
            let clock = ManualClock::new(0);
            let (tx, rx) = mpsc::channel(64);
            let mut game = Game::new_unchecked(layout, &TUNING, Box::new(clock.clone()), rx);
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            game.bus_mut().subscribe_many(&EventKind::ALL, move |event| {
                sink.lock().expect("events mutex poisoned").push(event.clone());
            });
            game.tick();
            Self {
                game,
                clock,
                tx,
                events,
            }
        }

        fn send(&self, kind: CommandKind, piece: &str, cells: &[Cell]) {
            let cmd = Command::new(
                self.clock.now_ms(),
                piece,
                kind,
                cells.iter().copied().map(Into::into).collect(),
            );
            self.tx.try_send(cmd).expect("expected command queue to accept");
        }

        fn advance_and_tick(&mut self, ms: i64) {
            self.clock.advance(ms);
            self.game.tick();
        }

        fn drain(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().expect("events mutex poisoned"))
        }
    }

    fn count(events: &[Event], kind: EventKind) -> usize {
        events.iter().filter(|e| e.kind == kind).count()
    }

    // 8x8 board with a king each and a few pieces of interest.
    const SMALL: &str = "\
KB,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
PB,,,,,,,
,,,,,,,
PW,,,,,,,
RW,NW,,,KW,,,
";

    #[test]
    fn when_layout_has_no_black_king_then_game_construction_fails() {
        let layout = Layout::parse("KW,PB").expect("expected layout to parse");
        let (_tx, rx) = mpsc::channel(1);

        let result = Game::new(layout, &TUNING, Box::new(ManualClock::new(0)), rx);

        assert_eq!(
            result.err(),
            Some(SetupError::KingCount { white: 1, black: 0 })
        );
    }

    #[test]
    fn when_first_tick_runs_then_game_starts_and_snapshot_is_published() {
        let h = Harness::new(SMALL);
        let events = h.drain();

        assert_eq!(events[0].kind, EventKind::GameStarted);
        assert_eq!(events[0].str_field("message"), Some(GAME_START_MESSAGE));
        assert_eq!(count(&events, EventKind::StateSnapshot), 1);
        assert!(h.game.is_started());
    }

    #[test]
    fn when_pawn_is_moved_then_piece_moved_and_snapshot_report_destination() {
        let mut h = Harness::new(SMALL);
        h.drain();
        let version = h.game.state_version();

        h.send(CommandKind::Move, "PW_1", &[Cell(6, 0), Cell(5, 0)]);
        h.advance_and_tick(10);

        let events = h.drain();
        let moved = events
            .iter()
            .find(|e| e.kind == EventKind::PieceMoved)
            .expect("expected piece_moved");
        assert_eq!(moved.cell_field("from"), Some(Cell(6, 0)));
        assert_eq!(moved.cell_field("to"), Some(Cell(5, 0)));
        assert_eq!(moved.str_field("player"), Some("white"));
        assert_eq!(moved.payload["capture"], false);

        let snapshot = events
            .iter()
            .rev()
            .find_map(Event::snapshot)
            .expect("expected snapshot");
        assert_eq!(snapshot.version, version + 1);
        assert_eq!(
            snapshot.piece("PW_1").map(|p| (p.cell, p.state)),
            Some((Cell(5, 0), StateName::Move))
        );
    }

    #[test]
    fn when_busy_piece_is_commanded_then_command_waits_until_idle() {
        let mut h = Harness::new(SMALL);
        h.send(CommandKind::Move, "PW_1", &[Cell(5, 0)]);
        h.advance_and_tick(1);
        h.send(CommandKind::Move, "PW_1", &[Cell(5, 1)]);
        h.advance_and_tick(1);

        assert_eq!(h.game.deferred_len(), 1);
        assert_eq!(h.game.piece("PW_1").map(Piece::cell), Some(Cell(5, 0)));

        // One cell of motion plus the long rest.
        h.advance_and_tick(1_000 + 200);

        assert_eq!(h.game.deferred_len(), 0);
        let pawn = h.game.piece("PW_1").expect("expected pawn");
        assert_eq!(pawn.cell(), Cell(5, 1));
        assert_eq!(pawn.state(), StateName::Move);
    }

    #[test]
    fn when_command_is_deferred_or_selects_then_a_move_cue_still_plays() {
        let mut h = Harness::new(SMALL);
        h.send(CommandKind::Move, "PW_1", &[Cell(5, 0)]);
        h.advance_and_tick(1);
        h.drain();

        h.send(CommandKind::Move, "PW_1", &[Cell(4, 0)]);
        h.advance_and_tick(1);
        let deferred = h.drain();
        assert_eq!(h.game.deferred_len(), 1);
        assert_eq!(count(&deferred, EventKind::PieceMoved), 0);
        assert_eq!(count(&deferred, EventKind::SoundPlay), 1);

        h.send(CommandKind::Select, "RW_1", &[Cell(7, 0)]);
        h.advance_and_tick(1);
        let selected = h.drain();
        assert_eq!(count(&selected, EventKind::PieceMoved), 0);
        let cue = selected
            .iter()
            .find(|e| e.kind == EventKind::SoundPlay)
            .expect("expected sound cue for select");
        assert_eq!(cue.payload["capture"], false);
    }

    #[test]
    fn when_command_targets_unknown_piece_then_it_is_dropped() {
        let mut h = Harness::new(SMALL);
        h.drain();
        let version = h.game.state_version();

        h.send(CommandKind::Move, "QW_9", &[Cell(3, 3)]);
        h.advance_and_tick(5);

        assert_eq!(h.game.state_version(), version);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn when_white_moves_onto_black_then_black_is_captured_once() {
        let mut h = Harness::new(SMALL);
        h.drain();
        let version = h.game.state_version();

        h.send(CommandKind::Move, "RW_1", &[Cell(7, 0), Cell(4, 0)]);
        h.send(CommandKind::Move, "PW_1", &[Cell(6, 0), Cell(6, 1)]);
        h.advance_and_tick(1);
        let events = h.drain();

        let captures: Vec<&Event> = events
            .iter()
            .filter(|e| e.kind == EventKind::Capture)
            .collect();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].str_field("player"), Some("white"));
        assert_eq!(captures[0].str_field("piece"), Some("P"));
        assert!(h.game.piece("PB_1").is_none());
        // Two accepted moves plus exactly one capture.
        assert_eq!(h.game.state_version(), version + 3);
        assert!(events.iter().any(|e| e.kind == EventKind::SoundPlay
            && e.payload["capture"] == true));
    }

    #[test]
    fn when_two_friendly_pieces_land_on_one_cell_then_one_remains_silently() {
        let mut h = Harness::new(SMALL);
        h.drain();

        h.send(CommandKind::Move, "PW_1", &[Cell(5, 1)]);
        h.send(CommandKind::Move, "NW_1", &[Cell(5, 1)]);
        h.advance_and_tick(1);
        // Knight is airborne while moving; the overlap settles once it rests.
        h.advance_and_tick(2_000);

        let events = h.drain();
        assert_eq!(count(&events, EventKind::Capture), 0);
        let on_cell = h
            .game
            .pieces()
            .iter()
            .filter(|p| p.cell() == Cell(5, 1))
            .count();
        assert_eq!(on_cell, 1);
    }

    #[test]
    fn when_knight_is_mid_move_on_opponent_then_no_capture_is_emitted() {
        let mut h = Harness::new(
            "\
KB,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
,,PB,,,,,
,,,,,,,
,NW,,,KW,,,
",
        );
        h.drain();

        h.send(CommandKind::Move, "NW_1", &[Cell(7, 1), Cell(5, 2)]);
        h.advance_and_tick(1);
        h.advance_and_tick(500);

        assert_eq!(h.game.piece("NW_1").map(Piece::state), Some(StateName::Move));
        assert_eq!(count(&h.drain(), EventKind::Capture), 0);
        assert!(h.game.piece("PB_1").is_some());
    }

    #[test]
    fn when_king_is_captured_then_game_ends_once() {
        let mut h = Harness::new(
            "\
KB,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
,,,,,,,
RW,,,,KW,,,
",
        );
        h.drain();

        h.send(CommandKind::Move, "RW_1", &[Cell(0, 0)]);
        h.advance_and_tick(1);
        h.advance_and_tick(1);

        let events = h.drain();
        let ended: Vec<&Event> = events
            .iter()
            .filter(|e| e.kind == EventKind::GameEnded)
            .collect();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].str_field("winner"), Some("white"));
        assert_eq!(ended[0].str_field("reason"), Some(KING_CAPTURED));
        assert!(h.game.is_finished());
    }

    #[test]
    fn when_two_ticks_read_the_same_millisecond_then_second_is_later() {
        let mut h = Harness::new(SMALL);
        let first = h.game.last_tick_ms().expect("expected first tick time");

        h.game.tick();
        let second = h.game.last_tick_ms().expect("expected second tick time");

        assert_eq!(second, first + 1);
    }

    #[test]
    fn when_snapshot_is_requested_twice_then_version_is_stable() {
        let h = Harness::new(SMALL);
        assert_eq!(h.game.snapshot(), h.game.snapshot());
    }

    #[test]
    fn when_state_changes_then_version_never_decreases() {
        let mut h = Harness::new(SMALL);
        let mut last = h.game.state_version();
        let script: [(&str, Cell); 3] = [
            ("PW_1", Cell(5, 0)),
            ("RW_1", Cell(7, 3)),
            ("KW_1", Cell(6, 4)),
        ];
        for (piece, to) in script {
            h.send(CommandKind::Move, piece, &[to]);
            h.advance_and_tick(7);
            let version = h.game.state_version();
            assert!(version > last);
            last = version;
        }
    }
}
