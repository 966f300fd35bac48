// Frameworks layer: configuration, tracing bootstrap and the axum server.

pub mod config;
pub mod server;
