//! Game Controller Contract
//!
//! The polymorphic surface every game plugs into. A game supplies a
//! [`GameModel`] (snapshot/restore/terminal-outcome) and a
//! [`GameController`] (start, apply a decoded move, adjudicate a claimed
//! game-over). The rest of the server never sees a concrete game type.
//!
//! ## Module Structure
//!
//! - `model`: the capability trait a live game state implements
//! - `controller`: lifecycle, mutation, and adjudication entry points

pub mod controller;
pub mod model;

pub use controller::{Adjudication, EchoPolicy, GameController, GameError};
pub use model::GameModel;
