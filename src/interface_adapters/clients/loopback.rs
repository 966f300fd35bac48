// In-process transport: talks to the hub directly, no sockets.

use super::transport::{Transport, TransportError, ensure_cmd_id};
use crate::domain::{Color, Command, Event};
use crate::interface_adapters::net::{Hub, Submission};
use crate::interface_adapters::protocol::decode_event;
use crate::interface_adapters::utils::rng::rand_id;
use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub struct LoopbackTransport {
    hub: Hub,
    conn_id: u64,
    player: Color,
    events: broadcast::Receiver<Utf8Bytes>,
    // Replies addressed to this client only (assignment, snapshots, results).
    replies: VecDeque<Event>,
}

impl LoopbackTransport {
    /// Joins the hub as a new session and queues the assignment and snapshot.
    pub async fn connect(hub: Hub, player: Option<Color>) -> Self {
        let conn_id = rand_id();
        let events = hub.subscribe();
        let player = hub.join(conn_id, player).await;
        let replies = VecDeque::from([
            Event::assign_player(player, hub.now_ms()),
            hub.snapshot_event().await,
        ]);
        Self {
            hub,
            conn_id,
            player,
            events,
            replies,
        }
    }

    pub fn player(&self) -> Color {
        self.player
    }

    pub async fn get_snapshot(&mut self) {
        let snapshot = self.hub.snapshot_event().await;
        self.replies.push_back(snapshot);
    }

    pub async fn close(self) {
        self.hub.leave(self.conn_id).await;
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send_command(&mut self, mut cmd: Command) -> Result<String, TransportError> {
        let cmd_id = ensure_cmd_id(&mut cmd);
        let submission = self.hub.submit(self.conn_id, cmd).await;
        if submission == Submission::Closed {
            return Err(TransportError::Closed);
        }
        if let Some(result) = submission.result_event(self.hub.acks(), self.hub.now_ms()) {
            self.replies.push_back(result);
        }
        Ok(cmd_id)
    }

    async fn next_event(&mut self) -> Result<Event, TransportError> {
        loop {
            if let Some(reply) = self.replies.pop_front() {
                return Ok(reply);
            }
            match self.events.recv().await {
                Ok(bytes) => match decode_event(bytes.as_str()) {
                    Ok(event) => return Ok(event),
                    Err(e) => debug!(error = %e, "ignoring undecodable event"),
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "loopback lagged; resyncing with snapshot");
                    return Ok(self.hub.snapshot_event().await);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(TransportError::Closed),
            }
        }
    }
}
