//! Message Registry
//!
//! Maps an envelope tag to the handler that decodes it and applies it to
//! the live model. Built once per game type when its controller is
//! created; dispatch is a plain map lookup on the wire tag, so the set of
//! message types stays open without any runtime type inspection.
//!
//! An unrecognized tag for the active game is `UnknownMessageType`: the
//! caller logs and drops it rather than killing the table, so one
//! malformed or future client cannot crash a game in progress.

use std::collections::HashMap;

use crate::game::{EchoPolicy, GameError, GameModel};
use crate::protocol::Envelope;
use crate::table::SeatIndex;

/// A boxed tag handler: decode the envelope, mutate the model, report the
/// echo policy for re-broadcast.
type Handler = Box<
    dyn Fn(&mut dyn GameModel, &Envelope, SeatIndex) -> Result<EchoPolicy, GameError>
        + Send
        + Sync,
>;

/// Tag-keyed dispatch table for one game's message vocabulary.
#[derive(Default)]
pub struct MessageRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl MessageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a tag. A tag is unique within a table's
    /// vocabulary; registering it twice replaces the earlier handler.
    pub fn register<F>(&mut self, tag: &'static str, handler: F)
    where
        F: Fn(&mut dyn GameModel, &Envelope, SeatIndex) -> Result<EchoPolicy, GameError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(tag, Box::new(handler));
    }

    /// Route an envelope to its handler by tag.
    pub fn dispatch(
        &self,
        model: &mut dyn GameModel,
        envelope: &Envelope,
        sender_seat: SeatIndex,
    ) -> Result<EchoPolicy, GameError> {
        let handler = self
            .handlers
            .get(envelope.tag())
            .ok_or_else(|| GameError::UnknownMessageType(envelope.tag().to_string()))?;
        handler(model, envelope, sender_seat)
    }

    /// Whether a tag is part of this vocabulary.
    pub fn knows(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
