// Client-side adapters: transports to a running game and the local board mirror.

pub mod backoff;
pub mod loopback;
pub mod mirror;
pub mod transport;
pub mod ws;

pub use backoff::{Backoff, BackoffPolicy};
pub use loopback::LoopbackTransport;
pub use mirror::{BoardMirror, CommandOutcome};
pub use transport::{Transport, TransportError, event_stream};
pub use ws::{WsTransport, WsTransportConfig};
