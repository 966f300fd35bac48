// Network adapter modules: the shared hub and the per-connection socket handler.

pub mod client;
pub mod hub;

pub use client::ws_handler;
pub use hub::{Hub, Submission, attach_feed};
