// Use cases layer: the game authority and the tasks and aggregators around it.

pub mod collisions;
pub mod game;
pub mod handle;
pub mod history;
pub mod score;
pub mod ticker;
pub mod types;

pub use game::Game;
pub use handle::{GameHandle, launch_game};
pub use history::{HistoryEntry, MoveHistory};
pub use score::{ScoreBoard, Totals};
pub use ticker::{TickerHandle, spawn_ticker};
pub use types::GameOptions;
