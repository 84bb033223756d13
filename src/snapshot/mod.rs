//! Snapshot Codec
//!
//! The foundational contract every game model implements: full game state
//! in, self-describing structured document out, and back again. A client
//! that joins or reconnects mid-game restores from one of these documents
//! and must end up observably identical to the server's model.

pub mod document;

pub use document::{Document, Node, SnapshotError};
