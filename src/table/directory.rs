//! Table Directory
//!
//! The server-wide map from table number to live table, handed explicitly
//! to dispatch and controller calls, never ambient global state. Each
//! table sits behind its own `RwLock`; holding a table's write lock is
//! the single-writer discipline that serializes that game's mutations,
//! and two different tables never contend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::games::GameKind;
use crate::table::table::{Table, TableConfig, TablePhase};
use crate::table::{SeatIndex, TableId};

/// Directory of all live tables for one server process.
pub struct TableDirectory {
    tables: RwLock<BTreeMap<TableId, Arc<RwLock<Table>>>>,
    next_number: AtomicU32,
}

impl TableDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            next_number: AtomicU32::new(1),
        }
    }

    /// Create a new waiting table and return its number and handle.
    pub async fn create_table(
        &self,
        kind: GameKind,
        config: TableConfig,
    ) -> (TableId, Arc<RwLock<Table>>) {
        let number = self.next_number.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(RwLock::new(Table::new(number, kind, config)));
        self.tables.write().await.insert(number, table.clone());
        (number, table)
    }

    /// Look up a table by number.
    pub async fn get(&self, number: TableId) -> Option<Arc<RwLock<Table>>> {
        self.tables.read().await.get(&number).cloned()
    }

    /// Seat index of a username at a table, if seated there.
    pub async fn seat_of(&self, username: &str, number: TableId) -> Option<SeatIndex> {
        let table = self.get(number).await?;
        let guard = table.read().await;
        guard.seat_of(username)
    }

    /// Username occupying a seat at a table, if any.
    pub async fn username_of(&self, number: TableId, seat: SeatIndex) -> Option<String> {
        let table = self.get(number).await?;
        let guard = table.read().await;
        guard.username_of(seat).map(str::to_string)
    }

    /// Remove a table outright.
    pub async fn remove(&self, number: TableId) {
        self.tables.write().await.remove(&number);
    }

    /// Number of live tables.
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Recycle tables every connection has left. A deserted WAITING or
    /// FINISHED table has no way back; a deserted PLAYING table is kept
    /// briefly in case its players reconnect, then reaped too.
    pub async fn cleanup(&self, reap_playing: bool) {
        let mut tables = self.tables.write().await;
        let mut to_remove = Vec::new();

        for (number, table) in tables.iter() {
            let guard = table.read().await;
            if !guard.is_deserted() {
                continue;
            }
            match guard.phase() {
                TablePhase::Waiting | TablePhase::Finished => to_remove.push(*number),
                TablePhase::Playing if reap_playing => to_remove.push(*number),
                TablePhase::Playing => {}
            }
        }

        for number in to_remove {
            tables.remove(&number);
        }
    }
}

impl Default for TableDirectory {
    fn default() -> Self {
        Self::new()
    }
}
