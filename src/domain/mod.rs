// Domain layer: board, pieces, state machine, and the event vocabulary.

pub mod board;
pub mod bus;
pub mod cell;
pub mod clock;
pub mod command;
pub mod errors;
pub mod event;
pub mod layout;
pub mod physics;
pub mod piece;
pub mod snapshot;
pub mod state;
pub mod tuning;

pub use board::{Board, Occupancy};
pub use bus::{EventBus, SubscriptionId};
pub use cell::Cell;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use command::{Command, CommandKind, Param};
pub use errors::{PieceIdError, SetupError};
pub use event::{CommandStatus, Event, EventKind, Payload};
pub use layout::{Layout, Placement, STANDARD_LAYOUT};
pub use piece::{Color, Piece, PieceId, PieceKind, Refusal};
pub use snapshot::{CursorView, PieceView, Snapshot};
pub use state::{StateGraph, StateName, Trigger};
pub use tuning::PhysicsTuning;
