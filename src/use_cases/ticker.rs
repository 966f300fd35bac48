use super::game::Game;
use crate::domain::Snapshot;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info};

/// Cancels and awaits the world task of one game.
///
/// Cancelling the ticker does not touch open connections.
pub struct TickerHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<Game>,
}

impl TickerHandle {
    pub fn cancel(&self) {
        self.shutdown.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the ticker to stop and hands the game back.
    pub async fn join(self) -> Option<Game> {
        match self.task.await {
            Ok(game) => Some(game),
            Err(err) => {
                error!(error = %err, "ticker task failed");
                None
            }
        }
    }
}

pub fn spawn_ticker(
    game: Game,
    tick_interval: Duration,
    snapshots: watch::Sender<Snapshot>,
) -> TickerHandle {
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(world_task(
        game,
        tick_interval,
        snapshots,
        Arc::clone(&shutdown),
    ));
    TickerHandle { shutdown, task }
}

async fn world_task(
    mut game: Game,
    tick_interval: Duration,
    snapshots: watch::Sender<Snapshot>,
    shutdown: Arc<Notify>,
) -> Game {
    // A zero interval only yields between ticks.
    let mut interval = (!tick_interval.is_zero()).then(|| {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!(ticks, "ticker cancelled");
                break;
            }
            _ = next_tick(&mut interval) => {}
        }

        ticks += 1;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| game.tick())) {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(ticks, reason = %reason, "tick panicked; continuing");
            continue;
        }

        // Keep the latest view current; wake readers only when the version moves.
        let snapshot = game.snapshot();
        snapshots.send_if_modified(|current| {
            let changed = current.version != snapshot.version;
            *current = snapshot;
            changed
        });

        if game.is_finished() {
            info!(ticks, "game finished; ticker stopped");
            break;
        }
    }

    game
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, Command, CommandKind, EventKind, Layout, ManualClock, PhysicsTuning};
    use tokio::sync::mpsc;

    fn game(csv: &str) -> (Game, mpsc::Sender<Command>, ManualClock) {
        let clock = ManualClock::new(0);
        let (tx, rx) = mpsc::channel(8);
        let layout = Layout::parse(csv).expect("expected layout to parse");
        let game = Game::new(layout, &PhysicsTuning::default(), Box::new(clock.clone()), rx)
            .expect("expected valid layout");
        (game, tx, clock)
    }

    #[tokio::test]
    async fn when_ticker_is_cancelled_then_game_is_handed_back() {
        let (game, _tx, _clock) = game("KW,,KB");
        let (snap_tx, _snap_rx) = watch::channel(game.snapshot());

        let ticker = spawn_ticker(game, Duration::from_millis(1), snap_tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        ticker.cancel();

        let game = ticker.join().await.expect("expected game back");
        assert!(game.is_started());
    }

    #[tokio::test]
    async fn when_move_is_applied_then_watch_sees_new_version() {
        let (game, tx, _clock) = game("KW,,KB\nPW,,");
        let (snap_tx, mut snap_rx) = watch::channel(game.snapshot());
        let ticker = spawn_ticker(game, Duration::ZERO, snap_tx);

        tx.send(Command::new(0, "PW_1", CommandKind::Move, vec![Cell(1, 1).into()]))
            .await
            .expect("expected command queue open");
        tokio::time::timeout(Duration::from_secs(2), snap_rx.changed())
            .await
            .expect("expected snapshot before timeout")
            .expect("expected ticker alive");

        let snapshot = snap_rx.borrow().clone();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.piece("PW_1").map(|p| p.cell), Some(Cell(1, 1)));
        ticker.cancel();
    }

    #[tokio::test]
    async fn when_king_falls_then_ticker_stops_on_its_own() {
        let (game, tx, _clock) = game("KW,RB,KB");
        let (snap_tx, _snap_rx) = watch::channel(game.snapshot());
        let ticker = spawn_ticker(game, Duration::ZERO, snap_tx);

        tx.send(Command::new(0, "RB_1", CommandKind::Move, vec![Cell(0, 0).into()]))
            .await
            .expect("expected command queue open");

        let game = tokio::time::timeout(Duration::from_secs(2), ticker.join())
            .await
            .expect("expected ticker to stop")
            .expect("expected game back");
        assert!(game.is_finished());
    }

    #[tokio::test]
    async fn when_a_tick_panics_then_later_ticks_still_publish() {
        let (mut game, tx, _clock) = game("KW,,KB\nPW,,PW");
        let mut failed_once = false;
        game.bus_mut().subscribe(EventKind::PieceMoved, move |_| {
            if !failed_once {
                failed_once = true;
                panic!("subscriber failed");
            }
        });
        let (snap_tx, mut snap_rx) = watch::channel(game.snapshot());
        let ticker = spawn_ticker(game, Duration::ZERO, snap_tx);

        tx.send(Command::new(0, "PW_1", CommandKind::Move, vec![Cell(1, 1).into()]))
            .await
            .expect("expected command queue open");
        tx.send(Command::new(0, "PW_2", CommandKind::Move, vec![Cell(0, 1).into()]))
            .await
            .expect("expected command queue open");

        tokio::time::timeout(Duration::from_secs(2), snap_rx.wait_for(|s| s.version >= 2))
            .await
            .expect("expected ticks to continue after the panic")
            .expect("expected ticker alive");

        assert!(!ticker.is_finished());
        let snapshot = snap_rx.borrow().clone();
        assert_eq!(snapshot.piece("PW_1").map(|p| p.cell), Some(Cell(1, 1)));
        assert_eq!(snapshot.piece("PW_2").map(|p| p.cell), Some(Cell(0, 1)));
        ticker.cancel();
    }
}
