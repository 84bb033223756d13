//! Message Protocol
//!
//! The uniform wire shape for everything a client says about a game: a
//! tagged [`Envelope`] carrying named scalar/array attributes, the
//! [`WireMessage`] encode/decode contract each concrete message type
//! implements, the per-game [`MessageRegistry`] that routes envelopes by
//! tag, and the outer [`ClientFrame`]/[`ServerFrame`] transport enums.

pub mod control;
pub mod envelope;
pub mod frames;
pub mod registry;

pub use control::{GameOverClaim, ResyncRequest};
pub use envelope::{Envelope, ProtocolError, WireMessage};
pub use frames::{ClientFrame, ErrorCode, SeatResult, ServerFrame};
pub use registry::MessageRegistry;
