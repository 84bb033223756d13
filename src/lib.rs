//! # Table Server
//!
//! A server framework for hosting many simultaneous turn-based
//! multiplayer games in one process. Each game runs at a *table*: an
//! isolated unit pairing seated players (and observers) with one live
//! game model, mutated only under that table's write lock.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TABLE SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  snapshot/       - Game-state snapshot codec                 │
//! │  └── document.rs - Named attribute/child tree                │
//! │                                                              │
//! │  protocol/       - Wire protocol                             │
//! │  ├── envelope.rs - Tagged game-message envelope              │
//! │  ├── registry.rs - Tag → handler dispatch per game           │
//! │  ├── control.rs  - Reserved tags (resync, game over)         │
//! │  └── frames.rs   - Client/server transport frames            │
//! │                                                              │
//! │  game/           - The per-game plug-in contract             │
//! │  ├── model.rs    - Live state + snapshot/restore             │
//! │  └── controller.rs - Start, apply, adjudicate                │
//! │                                                              │
//! │  table/          - Table lifecycle and directory             │
//! │  ├── table.rs    - Seats, phase, single live model           │
//! │  └── directory.rs- Server-wide table map                     │
//! │                                                              │
//! │  games/          - Built-in game engines                     │
//! │  ├── connect_four.rs                                         │
//! │  └── gomoku.rs                                               │
//! │                                                              │
//! │  network/        - WebSocket transport (non-game-semantic)   │
//! │  ├── server.rs   - Accept loop + per-connection tasks        │
//! │  └── dispatcher.rs - Frame routing + sequencing discipline   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantees
//!
//! All mutation of one table happens under its write lock, and the
//! broadcast a mutation triggers is enqueued before the lock drops. A
//! joining or resyncing connection gets its snapshot enqueued under that
//! same lock, so over its FIFO outbound queue it observes the snapshot
//! strictly before any later move: never a move the snapshot already
//! contains, never a gap.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod games;
pub mod network;
pub mod protocol;
pub mod snapshot;
pub mod table;

// Re-export the types a game implementation touches.
pub use game::{Adjudication, EchoPolicy, GameController, GameError, GameModel};
pub use games::GameKind;
pub use network::{ServerConfig, TableServer};
pub use protocol::{Envelope, MessageRegistry, ProtocolError, WireMessage};
pub use snapshot::{Document, Node, SnapshotError};
pub use table::{Table, TableConfig, TableDirectory, TableId, TablePhase};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
