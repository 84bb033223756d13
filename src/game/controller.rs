//! Game Controller Entry Points
//!
//! Lifecycle (start), mutation (apply a decoded move) and adjudication
//! (verify a claimed game-over) for one game type. The server never takes
//! a client's word for an outcome: adjudication recomputes it from the
//! model and the computed result is what propagates.

use serde::{Deserialize, Serialize};

use crate::game::model::GameModel;
use crate::protocol::registry::MessageRegistry;
use crate::protocol::{Envelope, ProtocolError};
use crate::snapshot::SnapshotError;
use crate::table::{SeatIndex, TableConfig, TableId};

/// Server-verified outcome for one (table, seat) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjudication {
    /// The seat won.
    Win,
    /// The seat lost.
    Lose,
    /// The game ended without a winner.
    Draw,
    /// The model's own check does not consider the game over.
    Undetermined,
}

impl Adjudication {
    /// Whether this outcome ends the game.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Adjudication::Undetermined)
    }
}

/// Whether a successfully applied envelope is re-broadcast to everyone or
/// only to the other members of the table.
///
/// Most moves are sender-excluded: the sender applied the move locally
/// before sending. A handler opts into echo when its semantics need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPolicy {
    /// Broadcast to every member except the sender.
    Others,
    /// Broadcast to every member including the sender.
    All,
}

/// Errors from the controller and table mutation path.
///
/// `IllegalMove` and `AdjudicationMismatch` are routine: clients cannot
/// be trusted, and both leave the connection alive and the model
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The envelope's tag names no handler for the active game.
    #[error("unknown message type `{0}` for the active game")]
    UnknownMessageType(String),

    /// The move violates game rules for the current turn or state.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// Mutation attempted after the table reached FINISHED.
    #[error("table is closed")]
    TableClosed,

    /// Mutation or snapshot attempted before the game started.
    #[error("game has not started")]
    GameNotStarted,

    /// The sender occupies no seat at this table.
    #[error("sender is not seated at this table")]
    NotSeated,

    /// Every seat is taken and the game has begun or will without you.
    #[error("no vacant seat at this table")]
    TableFull,

    /// A handler was dispatched against a model of the wrong game type.
    #[error("message does not apply to the active game model")]
    ModelMismatch,

    /// A client claimed an outcome the server's own check does not confirm.
    #[error("claimed outcome {claimed:?} not confirmed by server check ({computed:?})")]
    AdjudicationMismatch {
        /// What the client claimed.
        claimed: Adjudication,
        /// What the server computed.
        computed: Adjudication,
    },

    /// The table configuration could not produce a valid game.
    #[error("invalid table configuration: {0}")]
    BadConfig(String),

    /// Envelope decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Snapshot encoding or decoding failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// One game type's plug into the server.
pub trait GameController: Send + Sync {
    /// Build the initial model for a starting table. May consult table
    /// configuration for parameters such as board size.
    fn start_game(
        &self,
        table: TableId,
        config: &TableConfig,
    ) -> Result<Box<dyn GameModel>, GameError>;

    /// The tag-to-handler registry for this game's message vocabulary,
    /// built once when the controller is created.
    fn registry(&self) -> &MessageRegistry;

    /// Apply a client envelope to a live model. The sole legitimate
    /// mutator of the model; rejects illegal moves instead of silently
    /// applying them.
    fn apply(
        &self,
        model: &mut dyn GameModel,
        envelope: &Envelope,
        sender_seat: SeatIndex,
    ) -> Result<EchoPolicy, GameError> {
        self.registry().dispatch(model, envelope, sender_seat)
    }

    /// Independently recompute the outcome for a claiming seat. Must not
    /// echo the claim; the default asks the model's own terminal check.
    fn adjudicate(&self, model: &dyn GameModel, claiming_seat: SeatIndex) -> Adjudication {
        model.outcome_for(claiming_seat)
    }
}
