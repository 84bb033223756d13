//! Network Layer
//!
//! WebSocket transport and per-connection frame dispatch. Everything
//! game-semantic lives behind the table and controller layers; this layer
//! only moves frames and enforces the sequencing discipline around them.

pub mod dispatcher;
pub mod server;

pub use dispatcher::Dispatcher;
pub use server::{ServerConfig, TableServer, TableServerError};
