//! Transport Frames
//!
//! The outer JSON shapes exchanged over the WebSocket. A game envelope
//! always rides inside a frame that carries the target table number
//! out-of-band, so envelope schemas stay table-agnostic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::Adjudication;
use crate::games::GameKind;
use crate::protocol::Envelope;
use crate::snapshot::Document;
use crate::table::TableId;

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Open a new table for a game kind.
    CreateTable {
        /// Which game to play.
        kind: GameKind,
        /// Start-time parameters (board size etc.), read-only afterwards.
        #[serde(default)]
        config: BTreeMap<String, String>,
        /// The creating player, who takes seat 0.
        username: String,
    },

    /// Take a seat at, or start observing, an existing table.
    Join {
        /// Target table.
        table: TableId,
        /// Joining username.
        username: String,
        /// Observe without taking a seat.
        #[serde(default)]
        observer: bool,
    },

    /// A game move or control envelope for a table.
    Game {
        /// Target table, carried beside the envelope, never inside it.
        table: TableId,
        /// The tagged message.
        envelope: Envelope,
    },

    /// Leave a table (vacates the seat binding only).
    Leave {
        /// Target table.
        table: TableId,
    },

    /// Latency probe.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

/// Frames sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A table was created for the requester.
    TableCreated {
        /// The new table's number.
        table: TableId,
        /// Which game it will run.
        kind: GameKind,
        /// Seats the game requires before it starts.
        seats: usize,
    },

    /// A member joined the table (broadcast to all members).
    Joined {
        /// The table joined.
        table: TableId,
        /// Who joined.
        username: String,
        /// The seat taken, or `None` for an observer.
        seat: Option<usize>,
    },

    /// All seats filled; the game model now exists.
    GameStarted {
        /// The table that started.
        table: TableId,
        /// The game being played.
        kind: GameKind,
    },

    /// Point-in-time state document, unicast to one resyncing client.
    Snapshot {
        /// The table snapshotted.
        table: TableId,
        /// The complete, self-contained game state.
        document: Document,
    },

    /// A game envelope re-broadcast to table members.
    Game {
        /// The originating table.
        table: TableId,
        /// The envelope, sender stamped by the server.
        envelope: Envelope,
    },

    /// The game ended; outcomes are the server's computed results.
    GameOver {
        /// The finished table.
        table: TableId,
        /// Per-seat verified outcomes.
        results: Vec<SeatResult>,
    },

    /// A member left or disconnected (broadcast to remaining members).
    MemberLeft {
        /// The table left.
        table: TableId,
        /// Who left.
        username: String,
    },

    /// A recoverable error, unicast to the offending connection.
    Error {
        /// Machine-readable code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// Latency probe response.
    Pong {
        /// Client timestamp echoed back.
        timestamp: u64,
    },

    /// The server is shutting down.
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// One seat's verified outcome in a game-over broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatResult {
    /// Seat index.
    pub seat: usize,
    /// Occupying username at game end, if any.
    pub username: Option<String>,
    /// Server-computed outcome for this seat.
    pub outcome: Adjudication,
}

/// Error codes for [`ServerFrame::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The frame's table number matches no live table.
    UnknownTable,
    /// The sender holds no seat at the table.
    NotSeated,
    /// The move violates the game's rules.
    IllegalMove,
    /// The envelope tag names no handler for the active game.
    UnknownMessageType,
    /// The table already finished.
    TableClosed,
    /// The game has not started yet.
    GameNotStarted,
    /// The claimed outcome was not confirmed by the server's check.
    AdjudicationRejected,
    /// The frame or envelope could not be decoded.
    MalformedFrame,
    /// The table cannot take more members.
    TableFull,
    /// Anything unexpected.
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_roundtrip() {
        let mut envelope = Envelope::new("c4_drop").with_sender("alice");
        envelope.set_attr("column", 3);
        let frame = ClientFrame::Game {
            table: 17,
            envelope,
        };

        let json = serde_json::to_string(&frame).unwrap();
        let parsed: ClientFrame = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientFrame::Game { table, envelope } => {
                assert_eq!(table, 17);
                assert_eq!(envelope.tag(), "c4_drop");
                assert_eq!(envelope.attr_int("column").unwrap(), 3);
            }
            other => panic!("wrong frame: {other:?}"),
        }
    }

    #[test]
    fn test_create_table_defaults_config() {
        let json = r#"{"type":"create_table","kind":"gomoku","username":"bo"}"#;
        let parsed: ClientFrame = serde_json::from_str(json).unwrap();
        match parsed {
            ClientFrame::CreateTable { kind, config, .. } => {
                assert_eq!(kind, GameKind::Gomoku);
                assert!(config.is_empty());
            }
            other => panic!("wrong frame: {other:?}"),
        }
    }

    #[test]
    fn test_game_over_frame_roundtrip() {
        let frame = ServerFrame::GameOver {
            table: 4,
            results: vec![
                SeatResult {
                    seat: 0,
                    username: Some("alice".to_string()),
                    outcome: Adjudication::Win,
                },
                SeatResult {
                    seat: 1,
                    username: None,
                    outcome: Adjudication::Lose,
                },
            ],
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("game_over"));
        let parsed: ServerFrame = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerFrame::GameOver { results, .. } => {
                assert_eq!(results.len(), 2);
                assert_eq!(results[0].outcome, Adjudication::Win);
            }
            other => panic!("wrong frame: {other:?}"),
        }
    }

    #[test]
    fn test_error_code_wire_names() {
        let json = serde_json::to_string(&ErrorCode::UnknownMessageType).unwrap();
        assert_eq!(json, "\"unknown_message_type\"");
    }
}
