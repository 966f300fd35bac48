// Wire protocol: one JSON message per WebSocket text frame.
// Server -> client frames are serialized `Event`s.

use crate::domain::{Color, Command, Event};
use serde::{Deserialize, Serialize};

/// Session control messages, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlMessage {
    // Without a player the hub picks the side with fewer sessions.
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<Color>,
    },
    GetSnapshot,
}

/// Anything a client may send: a control message or a bare command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Control(ControlMessage),
    Command(Command),
}

impl From<ControlMessage> for ClientMessage {
    fn from(control: ControlMessage) -> Self {
        ClientMessage::Control(control)
    }
}

impl From<Command> for ClientMessage {
    fn from(cmd: Command) -> Self {
        ClientMessage::Command(cmd)
    }
}

/// Reasons attached to a rejected `command_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    WrongPlayer,
    InvalidPieceId,
    NotJoined,
    QueueFull,
}

impl Rejection {
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::WrongPlayer => "wrong player",
            Rejection::InvalidPieceId => "invalid piece id",
            Rejection::NotJoined => "join required",
            Rejection::QueueFull => "queue full",
        }
    }
}

pub fn encode_event(event: &Event) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

pub fn decode_event(text: &str) -> serde_json::Result<Event> {
    serde_json::from_str(text)
}

pub fn decode_client_message(text: &str) -> serde_json::Result<ClientMessage> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, CommandKind};
    use serde_json::json;

    #[test]
    fn when_join_is_decoded_then_player_is_optional() {
        let with_player =
            decode_client_message(r#"{"kind":"join","player":"B"}"#).expect("expected join");
        assert_eq!(
            with_player,
            ClientMessage::Control(ControlMessage::Join {
                player: Some(Color::Black)
            })
        );

        let bare = decode_client_message(r#"{"kind":"join"}"#).expect("expected join");
        assert_eq!(
            bare,
            ClientMessage::Control(ControlMessage::Join { player: None })
        );

        let snapshot =
            decode_client_message(r#"{"kind":"get_snapshot"}"#).expect("expected get_snapshot");
        assert_eq!(snapshot, ClientMessage::Control(ControlMessage::GetSnapshot));
    }

    #[test]
    fn when_command_is_decoded_then_it_is_not_mistaken_for_control() {
        let text = json!({
            "timestamp": 5,
            "piece_id": "PW_1",
            "type": "move",
            "params": [[6, 0], [4, 0]],
            "cmd_id": "abc"
        })
        .to_string();

        let Ok(ClientMessage::Command(cmd)) = decode_client_message(&text) else {
            panic!("expected command");
        };
        assert_eq!(cmd.kind, CommandKind::Move);
        assert_eq!(cmd.destination(), Some(Cell(4, 0)));
        assert_eq!(cmd.cmd_id.as_deref(), Some("abc"));
    }

    #[test]
    fn when_message_is_garbage_then_decoding_fails() {
        assert!(decode_client_message("not json").is_err());
        assert!(decode_client_message(r#"{"kind":"dance"}"#).is_err());
        assert!(decode_client_message(r#"{"piece_id":"PW_1"}"#).is_err());
    }
}
