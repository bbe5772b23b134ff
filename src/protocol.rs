use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bag::Bag;
use crate::grid::Grid;

/// Global match settings chosen by the host when starting a match. Gravity
/// intervals are milliseconds per one-cell drop.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSettings {
    pub seven_bag: bool,
    pub gravity: f64,
    pub soft_drop_speed: f64,
    pub lock_delay: f64,
    /// Host forces gameplay settings onto every player in the match.
    pub force_settings: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            seven_bag: true,
            gravity: 1000.0 / 5.0,
            soft_drop_speed: 1000.0 / 80.0,
            lock_delay: 500.0,
            force_settings: false,
        }
    }
}

/// Payload of an `update` request, dispatched on the `flag` field.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "flag", rename_all = "camelCase")]
pub enum StateUpdate {
    /// A lock or loss event: the player's full board and loss flag.
    Match { board: Grid, lost: bool },
    /// The player renamed themselves; board is unaffected.
    Username { username: String },
}

/// Everything a client can send over the channel.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join {
        player: String,
        #[serde(rename = "match")]
        match_id: String,
        username: String,
    },
    Bag {
        player: String,
    },
    Update {
        player: String,
        #[serde(flatten)]
        update: StateUpdate,
    },
    Start {
        player: String,
        settings: MatchSettings,
    },
    Pause {
        player: String,
    },
    /// Attach the live connection after joining (the transport-level join).
    JoinSocket {
        player: String,
    },
}

/// Per-player slice of the `init` snapshot a connecting player receives.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PlayerSnapshot {
    pub board: Grid,
    pub username: String,
}

/// Room broadcast payloads, dispatched on the `flag` field.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "flag", rename_all = "camelCase")]
pub enum UpdateEvent {
    /// Snapshot of every player in the match, sent once to a connecting
    /// player.
    Init {
        players: HashMap<String, PlayerSnapshot>,
    },
    /// A player's board, name, or loss flag changed.
    Update {
        player: String,
        board: Grid,
        username: String,
        lost: bool,
    },
    Join {
        player: String,
        username: String,
    },
    Leave {
        player: String,
    },
    /// Sent to exactly one player when the previous host disconnects.
    GiveHost,
}

/// Everything the server can send: request replies and room events share
/// the ordered channel.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// First message on every connection: the server-assigned player id.
    Welcome { player: String },
    Joined { is_host: bool },
    Bag { bag: Bag },
    Status { status: String },
    Update {
        #[serde(flatten)]
        event: UpdateEvent,
    },
    Start { settings: MatchSettings },
    Pause { paused: bool },
    Reset,
}

impl ServerMessage {
    pub fn ok() -> Self {
        ServerMessage::Status {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_round_trip() {
        let msg = ClientMessage::Update {
            player: "p1".into(),
            update: StateUpdate::Match {
                board: Grid::new(2, 2),
                lost: false,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"update\""));
        assert!(json.contains("\"flag\":\"match\""));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            ClientMessage::Update {
                update: StateUpdate::Match { lost: false, .. },
                ..
            }
        ));
    }

    #[test]
    fn join_uses_match_field_name() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"join","player":"p1","match":"m1","username":"anon"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Join { match_id, .. } => assert_eq!(match_id, "m1"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn update_event_flags_are_camel_case() {
        let msg = ServerMessage::Update {
            event: UpdateEvent::GiveHost,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"update","flag":"giveHost"}"#);
    }

    #[test]
    fn settings_default_and_field_names() {
        let settings = MatchSettings::default();
        assert!(settings.seven_bag);
        assert_eq!(settings.lock_delay, 500.0);
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("sevenBag"));
        assert!(json.contains("softDropSpeed"));
        assert!(json.contains("forceSettings"));
    }
}
