//! Table & Seat Directory
//!
//! A table pairs a fixed set of seats with one running game instance.
//! Tables are the unit of isolation: each lives behind its own lock in
//! the [`TableDirectory`], and all mutation for a table goes through that
//! single writer.
//!
//! ## Module Structure
//!
//! - `table`: one table (seats, lifecycle phases, members, the model slot)
//! - `directory`: table number → table, plus pure seat lookups

pub mod directory;
pub mod table;

pub use directory::TableDirectory;
pub use table::{GameOverReport, Table, TableConfig, TablePhase};

/// Table number, unique per server run.
pub type TableId = u32;

/// Zero-indexed seat position, stable for the lifetime of the table.
pub type SeatIndex = usize;
