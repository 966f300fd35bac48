// Wiring for one running game: command queue, snapshot watch, aggregators, ticker.

use super::game::Game;
use super::history::MoveHistory;
use super::score::ScoreBoard;
use super::ticker::{TickerHandle, spawn_ticker};
use super::types::GameOptions;
use crate::domain::{Clock, Command, EventBus, Layout, SetupError, Snapshot};
use tokio::sync::{mpsc, watch};

pub struct GameHandle {
    pub commands: mpsc::Sender<Command>,
    pub snapshots: watch::Receiver<Snapshot>,
    pub score: ScoreBoard,
    pub history: MoveHistory,
    pub ticker: TickerHandle,
}

/// Builds a game, lets `wire` subscribe to its bus, starts it and spawns its ticker.
///
/// `wire` runs before the start event so subscribers see `game_started`;
/// whatever it returns is handed back next to the handle.
/// Must be called from inside a tokio runtime.
pub fn launch_game<F, T>(
    layout: Layout,
    options: GameOptions,
    clock: Box<dyn Clock>,
    wire: F,
) -> Result<(GameHandle, T), SetupError>
where
    F: FnOnce(&mut EventBus) -> T,
{
    let (commands, rx) = mpsc::channel(options.command_capacity.max(1));
    let mut game = Game::new(layout, &options.tuning, clock, rx)?;

    let (score, _) = ScoreBoard::attach(game.bus_mut());
    let (history, _) = MoveHistory::attach(game.bus_mut());
    let wired = wire(game.bus_mut());

    let now = game.now_ms();
    game.start(now);

    let (snapshot_tx, snapshots) = watch::channel(game.snapshot());
    let ticker = spawn_ticker(game, options.tick_interval, snapshot_tx);

    let handle = GameHandle {
        commands,
        snapshots,
        score,
        history,
        ticker,
    };
    Ok((handle, wired))
}
