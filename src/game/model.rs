//! Game Model Capability Trait
//!
//! A live game state is anything that can snapshot itself, restore itself
//! from a snapshot, and report a terminal outcome per seat. Mutation is
//! not part of this trait: the only legitimate mutator of a live model is
//! the controller's apply path, reached through the message registry.

use std::any::Any;

use crate::game::controller::Adjudication;
use crate::snapshot::{Document, SnapshotError};
use crate::table::SeatIndex;

/// Capability set of a running game instance.
///
/// Invariant: for any model `M`, `restore(snapshot(M))` yields a state
/// observably identical to `M` under every accessor the game defines. No
/// field that affects an accessor may be omitted from the snapshot.
pub trait GameModel: Send + Sync {
    /// Encode the complete current state as a self-contained document.
    fn snapshot(&self) -> Document;

    /// Replace the complete current state with the document's contents.
    ///
    /// Partial restores are forbidden: on success every field reflects the
    /// document, and on failure the caller discards this instance and
    /// retries from a fresh model, so implementations decode into
    /// temporaries before touching `self`.
    fn restore(&mut self, document: &Document) -> Result<(), SnapshotError>;

    /// Terminal outcome for the given seat, recomputed from model state.
    fn outcome_for(&self, seat: SeatIndex) -> Adjudication;

    /// Whether the game has reached a terminal state.
    fn is_over(&self) -> bool;

    /// Downcast support for message handlers.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support for message handlers.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
