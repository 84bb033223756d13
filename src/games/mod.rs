//! Game Engines
//!
//! Concrete rule engines that plug into the generic table mechanism. The
//! server core never names these types directly; it reaches them through
//! [`GameKind`] and the `game` traits. Adding a game means adding a
//! module here and one `GameKind` arm; nothing in `table/` or
//! `network/` changes.
//!
//! - `connect_four`: single-tag move vocabulary, gravity board
//! - `gomoku`: one tag multiplexing place/pass/concede via the status
//!   discriminator, move history as ordered snapshot children

pub mod connect_four;
pub mod gomoku;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::game::GameController;

/// The games this server can run, one variant per rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Connect Four on a gravity board.
    ConnectFour,
    /// Gomoku (five in a row).
    Gomoku,
}

impl GameKind {
    /// Fixed seat capacity a table of this game requires.
    pub fn seat_count(self) -> usize {
        match self {
            GameKind::ConnectFour | GameKind::Gomoku => 2,
        }
    }

    /// Build the controller (and its message registry) for this game.
    pub fn controller(self) -> Arc<dyn GameController> {
        match self {
            GameKind::ConnectFour => Arc::new(connect_four::ConnectFourController::new()),
            GameKind::Gomoku => Arc::new(gomoku::GomokuController::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&GameKind::ConnectFour).unwrap(),
            "\"connect_four\""
        );
        let parsed: GameKind = serde_json::from_str("\"gomoku\"").unwrap();
        assert_eq!(parsed, GameKind::Gomoku);
    }

    #[test]
    fn test_controllers_have_vocabularies() {
        for kind in [GameKind::ConnectFour, GameKind::Gomoku] {
            assert!(!kind.controller().registry().is_empty());
        }
    }
}
