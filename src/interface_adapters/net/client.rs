use crate::domain::{Color, Event};
use crate::interface_adapters::net::hub::{Hub, Submission};
use crate::interface_adapters::protocol::{
    ClientMessage, ControlMessage, Rejection, decode_client_message, encode_event,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    CommandsClosed,
    EventsClosed,
    JoinRequired,
    JoinTimeout,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
pub const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| {
        // Connection id correlates logs before and after a color is assigned.
        let conn_id = rand_id();
        let span = info_span!("conn", conn_id, player = tracing::field::Empty);
        handle_socket(socket, hub, conn_id).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, hub: Hub, conn_id: u64) {
    let mut ctx = match bootstrap_connection(&mut socket, &hub, conn_id).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            warn!(error = ?e, "failed to bootstrap connection");
            let _ = socket.close().await;
            hub.leave(conn_id).await;
            return;
        }
    };
    info!(player = %ctx.player, "client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    hub.leave(conn_id).await;
    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!("client disconnected");
}

struct ConnCtx {
    conn_id: u64,
    player: Color,
    hub: Hub,
    events_rx: broadcast::Receiver<Utf8Bytes>,
    // Count lag recovery snapshots sent to this client.
    lag_recovery_count: u64,

    msgs_in: u64,
    msgs_out: u64,
    invalid_json: u32,

    last_queue_full_log: Instant,
    last_events_lag_log: Instant,
    last_invalid_json_log: Instant,

    close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    hub: &Hub,
    conn_id: u64,
) -> Result<ConnCtx, NetError> {
    // Subscribe before any await so no event published after the join is missed.
    let events_rx = hub.subscribe();

    let requested = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    let player = hub.join(conn_id, requested).await;
    Span::current().record("player", player.name());
    let msgs_out = send_assignment(socket, hub, player).await?;

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        conn_id,
        player,
        hub: hub.clone(),
        events_rx,
        lag_recovery_count: 0,

        msgs_in: 1,
        msgs_out,
        invalid_json: 0,

        last_queue_full_log: now,
        last_events_lag_log: now,
        last_invalid_json_log: now,

        close_frame: None,
    })
}

// Assignment followed by a full snapshot with cursors.
async fn send_assignment(socket: &mut WebSocket, hub: &Hub, player: Color) -> Result<u64, NetError> {
    send_event(socket, &Event::assign_player(player, hub.now_ms())).await?;
    send_event(socket, &hub.snapshot_event().await).await?;
    Ok(2)
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<usize, NetError> {
    let txt = encode_event(event).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<Option<Color>, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        match incoming.map_err(NetError::Ws)? {
            Message::Text(text) => match decode_client_message(&text) {
                Ok(ClientMessage::Control(ControlMessage::Join { player })) => return Ok(player),
                Ok(_) => {
                    let _ = send_close_with_reason(socket, close_code::POLICY, "join required").await;
                    return Err(NetError::JoinRequired);
                }
                Err(_) => {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid join payload")
                            .await;
                    return Err(NetError::JoinRequired);
                }
            },
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(socket, incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            event = ctx.events_rx.recv() => {
                match event {
                    Ok(bytes) => match forward_bytes(bytes, socket, &mut ctx.msgs_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut ctx.last_events_lag_log) {
                            warn!(missed = n, "events lagged; sending snapshot");
                        }

                        // Resync: the latest snapshot replaces whatever was missed.
                        ctx.lag_recovery_count += 1;
                        let snapshot = ctx.hub.snapshot_event().await;
                        match send_event(socket, &snapshot).await {
                            Ok(_) => {
                                ctx.msgs_out += 1;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send lag recovery snapshot");
                                true
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::EventsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let msg = match incoming {
        Some(Ok(msg)) => msg,
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            return Ok(LoopControl::Disconnect);
        }
        None => {
            info!("websocket closed");
            return Ok(LoopControl::Disconnect);
        }
    };

    let text = match msg {
        Message::Text(text) => text,
        Message::Binary(_) => {
            ctx.close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            return Ok(LoopControl::Disconnect);
        }
        Message::Ping(_) | Message::Pong(_) => return Ok(LoopControl::Continue),
        Message::Close(_) => return Ok(LoopControl::Disconnect),
    };
    ctx.msgs_in += 1;

    let parsed = match decode_client_message(&text) {
        Ok(parsed) => parsed,
        Err(parse_err) => {
            ctx.invalid_json += 1;
            if should_log(&mut ctx.last_invalid_json_log) {
                warn!(bytes = text.len(), error = %parse_err, "failed to parse client message");
            }
            if ctx.invalid_json > MAX_INVALID_JSON {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "too many invalid messages".into(),
                });
                return Ok(LoopControl::Disconnect);
            }
            return Ok(LoopControl::Continue);
        }
    };

    let outgoing = match parsed {
        ClientMessage::Control(ControlMessage::Join { player }) => {
            // A repeated join re-assigns the side and resends the initial state.
            ctx.player = ctx.hub.join(ctx.conn_id, player).await;
            Span::current().record("player", ctx.player.name());
            return match send_assignment(socket, &ctx.hub, ctx.player).await {
                Ok(sent) => {
                    ctx.msgs_out += sent;
                    Ok(LoopControl::Continue)
                }
                Err(err) => {
                    warn!(error = ?err, "failed to resend assignment");
                    Ok(LoopControl::Disconnect)
                }
            };
        }
        ClientMessage::Control(ControlMessage::GetSnapshot) => Some(ctx.hub.snapshot_event().await),
        ClientMessage::Command(cmd) => {
            let submission = ctx.hub.submit(ctx.conn_id, cmd).await;
            match &submission {
                Submission::Closed => return Err(NetError::CommandsClosed),
                Submission::Rejected {
                    rejection: Rejection::QueueFull,
                    ..
                } => {
                    if should_log(&mut ctx.last_queue_full_log) {
                        warn!("command queue full; rejecting command");
                    }
                }
                Submission::Rejected { rejection, .. } => {
                    debug!(reason = rejection.reason(), "command rejected");
                }
                Submission::Queued { .. } | Submission::CursorMoved => {}
            }
            submission.result_event(ctx.hub.acks(), ctx.hub.now_ms())
        }
    };

    let Some(event) = outgoing else {
        return Ok(LoopControl::Continue);
    };
    match send_event(socket, &event).await {
        Ok(_) => {
            ctx.msgs_out += 1;
            Ok(LoopControl::Continue)
        }
        Err(err) => {
            // A failed send drops this connection only.
            warn!(error = ?err, "failed to send reply");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(bytes: Utf8Bytes, socket: &mut WebSocket, msgs_out: &mut u64) -> LoopControl {
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to forward event");
            LoopControl::Disconnect
        }
    }
}
