//! Feature-store repositories (spec.md §3, §4.3, component C3).
//!
//! `Store` owns a single `rusqlite::Connection` behind a `Mutex` — the
//! scheduler's worker pool and the CLI share one store handle, and SQLite's
//! own locking makes a single connection the simplest correct design for a
//! file-backed store this size. Every repository method binds parameters
//! positionally; nothing is ever formatted into SQL text.

pub mod concepts;
pub mod daily_bars;
pub mod hot_rank;
pub mod market_index;
pub mod models;
pub mod money_flow;
pub mod prediction_cache;
pub mod recommendations;
pub mod search;
pub mod sector_flow;
pub mod tickers;
pub mod virtual_boards;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::StoreError;

refinery::embed_migrations!("migrations");

/// Daily-bar / money-flow batches are chunked at this size before each
/// upsert transaction commits (spec.md §4.3).
pub const LARGE_BATCH_SIZE: usize = 2000;
/// Sector-row batches are smaller since each row carries a JSON column.
pub const SECTOR_BATCH_SIZE: usize = 500;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path_str = path.as_ref().display().to_string();
        let mut conn = Connection::open(path.as_ref()).map_err(|source| StoreError::Connect {
            path: path_str,
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrations::runner()
            .run(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and by the CLI's dry-run mode.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        migrations::runner()
            .run(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("feature store connection lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='daily_bar'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
