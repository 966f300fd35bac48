// Client transport port: send commands, pull events.

use crate::domain::{Command, Event};
use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("not connected")]
    NotConnected,
    #[error("gave up reconnecting after {attempts} attempts")]
    GaveUp { attempts: u32 },
    #[error("game is no longer accepting commands")]
    Closed,
}

#[async_trait]
pub trait Transport: Send {
    /// Sends a command and returns its `cmd_id`, assigning one when missing.
    async fn send_command(&mut self, cmd: Command) -> Result<String, TransportError>;

    /// Waits for the next server event, resyncing behind the scenes where possible.
    async fn next_event(&mut self) -> Result<Event, TransportError>;
}

/// Endless event stream over a transport; it ends only after an unrecoverable error.
pub fn event_stream<T>(transport: T) -> impl Stream<Item = Result<Event, TransportError>>
where
    T: Transport + 'static,
{
    futures::stream::unfold(Some(transport), |state| async move {
        let mut transport = state?;
        match transport.next_event().await {
            Ok(event) => Some((Ok(event), Some(transport))),
            Err(err) => Some((Err(err), None)),
        }
    })
}

pub(crate) fn ensure_cmd_id(cmd: &mut Command) -> String {
    cmd.cmd_id
        .get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string())
        .clone()
}
