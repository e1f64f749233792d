//! Wire protocol: one JSON object per message, discriminated by `type`.
//!
//! Both directions are closed enums so the dispatcher's match is exhaustive;
//! adding a message type is a compile-time-checked exercise.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{CellPos, FoundWord, GameSettings, Player, PlayerId, PuzzleData, RoomStatus};

/// Messages a client may send to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        player_id: PlayerId,
        name: String,
        avatar: String,
    },
    LeaveRoom,
    PlayerReady {
        ready: bool,
    },
    UpdateAvatar {
        avatar: String,
    },
    CursorMove {
        x: f32,
        y: f32,
    },
    CursorLeave,
    ClaimWord {
        word: String,
        start: CellPos,
        end: CellPos,
    },
    RequestRematch,
    ChatMessage {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Typing {
        is_typing: bool,
    },
    Ping,
}

/// Snapshot of a room as sent to clients in `room_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub code: String,
    pub host_id: Option<PlayerId>,
    pub guest_id: Option<PlayerId>,
    pub players: HashMap<PlayerId, Player>,
    pub settings: GameSettings,
    pub status: RoomStatus,
    pub puzzle: Option<PuzzleData>,
    pub found_words: Vec<FoundWord>,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub winner_id: Option<PlayerId>,
    pub is_draw: bool,
}

/// Messages the coordinator sends to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomState {
        room: RoomView,
    },
    PlayerJoined {
        player: Player,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    PlayerReadyChanged {
        player_id: PlayerId,
        ready: bool,
    },
    #[serde(rename_all = "camelCase")]
    PlayerAvatarChanged {
        player_id: PlayerId,
        avatar: String,
    },
    GameStarting {
        countdown: u8,
    },
    #[serde(rename_all = "camelCase")]
    GameStarted {
        puzzle: PuzzleData,
        start_time: u64,
    },
    #[serde(rename_all = "camelCase")]
    CursorUpdate {
        player_id: PlayerId,
        x: f32,
        y: f32,
    },
    #[serde(rename_all = "camelCase")]
    CursorLeft {
        player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    WordClaimed {
        word: String,
        player_id: PlayerId,
        player_name: String,
        start: CellPos,
        end: CellPos,
        host_score: u32,
        guest_score: u32,
    },
    #[serde(rename_all = "camelCase")]
    WordClaimRejected {
        word: String,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    GameEnded {
        winner_id: Option<PlayerId>,
        is_draw: bool,
        host_score: u32,
        guest_score: u32,
    },
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected {
        player_id: PlayerId,
        name: String,
        reconnect_grace_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    PlayerReconnected {
        player_id: PlayerId,
    },
    OpponentLeft {
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    RematchRequested {
        player_id: PlayerId,
    },
    RematchStarting {
        countdown: u8,
    },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        id: String,
        sender_id: PlayerId,
        sender_name: String,
        sender_avatar: String,
        content: String,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    PlayerTyping {
        player_id: PlayerId,
        is_typing: bool,
    },
    Error {
        message: String,
    },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg = ClientMessage::JoinRoom {
            room_id: "ABC123".to_string(),
            player_id: "p1".to_string(),
            name: "Alice".to_string(),
            avatar: "🦊".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "join_room");
        assert_eq!(value["roomId"], "ABC123");
        assert_eq!(value["playerId"], "p1");

        let value = serde_json::to_value(ClientMessage::Ping).unwrap();
        assert_eq!(value["type"], "ping");
    }

    #[test]
    fn test_client_message_parses_camel_case() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"typing","isTyping":true}"#).unwrap();
        match msg {
            ClientMessage::Typing { is_typing } => assert!(is_typing),
            other => panic!("wrong variant: {other:?}"),
        }

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"claim_word","word":"FOX","start":{"r":0,"c":0},"end":{"r":0,"c":2}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::ClaimWord { word, start, end } => {
                assert_eq!(word, "FOX");
                assert_eq!(start, CellPos { r: 0, c: 0 });
                assert_eq!(end, CellPos { r: 0, c: 2 });
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"warp_drive"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("[1,2,3]").is_err());
    }

    #[test]
    fn test_server_message_tags() {
        let msg = ServerMessage::PlayerDisconnected {
            player_id: "p2".to_string(),
            name: "Bob".to_string(),
            reconnect_grace_ms: 10_000,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "player_disconnected");
        assert_eq!(value["reconnectGraceMs"], 10_000);

        let value = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(value["type"], "pong");
    }

    #[test]
    fn test_server_message_roundtrip() {
        let msg = ServerMessage::WordClaimed {
            word: "TIGER".to_string(),
            player_id: "p1".to_string(),
            player_name: "Alice".to_string(),
            start: CellPos { r: 2, c: 3 },
            end: CellPos { r: 2, c: 7 },
            host_score: 4,
            guest_score: 2,
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_str(&encoded).unwrap();
        match decoded {
            ServerMessage::WordClaimed {
                word, host_score, ..
            } => {
                assert_eq!(word, "TIGER");
                assert_eq!(host_score, 4);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
