//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Builders, the evaluator and the queue call store methods; they
//! never execute SQL directly.

mod corpus;
mod pushdown;
mod queue;
mod summary;

pub use queue::{ClaimedEntry, QueryResultRecord, QueueEntry};

use crate::error::{StatsError, StatsResult};
use rusqlite::Connection;
use std::time::Duration;

/// How long a connection waits on another writer before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct StatsStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl StatsStore {
    /// Open (or create) the stats database at `path`.
    pub fn open(path: &str) -> StatsResult<Self> {
        let unavailable = |e: rusqlite::Error| StatsError::StoreUnavailable {
            path: path.to_string(),
            reason: e.to_string(),
        };
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(unavailable)?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(unavailable)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> StatsResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Open a second connection to the same database.
    /// For in-memory databases this returns a new, isolated database.
    pub fn reopen(&self) -> StatsResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> StatsResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_corpus.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_summary.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_advanced_queue.sql"))?;
        Ok(())
    }
}

/// True when SQLite reported another writer holding the lock.
pub fn is_busy(err: &StatsError) -> bool {
    match err {
        StatsError::Database(e) => matches!(
            e.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
        ),
        _ => false,
    }
}
