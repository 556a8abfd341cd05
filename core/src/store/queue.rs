use super::StatsStore;
use crate::{
    error::{StatsError, StatsResult},
    types::QueueEntryId,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// One row of the advanced query queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    /// Canonical signature of the request.
    pub query: String,
    pub created_at: String,
    pub last_checkin: String,
    pub stale: bool,
    pub claim_token: Option<String>,
    pub result_id: Option<String>,
    pub time_completed: Option<String>,
}

impl QueueEntry {
    pub fn is_resolved(&self) -> bool {
        self.result_id.is_some()
    }
}

/// An entry this worker now owns until it resolves or releases it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedEntry {
    pub id: QueueEntryId,
    pub query: String,
    pub claim_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResultRecord {
    pub result_id: String,
    /// Serialized counter set.
    pub data: String,
    pub created_at: String,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn entry_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        query: row.get(1)?,
        created_at: row.get(2)?,
        last_checkin: row.get(3)?,
        stale: row.get::<_, i32>(4)? != 0,
        claim_token: row.get(5)?,
        result_id: row.get(6)?,
        time_completed: row.get(7)?,
    })
}

const ENTRY_COLUMNS: &str =
    "id, query, created_at, last_checkin, stale, claim_token, result_id, time_completed";

impl StatsStore {
    // ── Advanced query queue ───────────────────────────────────────

    /// Return the live entry for `signature`, creating it if none exists.
    /// The partial unique index makes concurrent callers converge on one row.
    pub fn insert_or_get_live_entry(&self, signature: &str) -> StatsResult<QueueEntry> {
        let ts = now();
        let inserted = self.conn.execute(
            "INSERT INTO advanced_query_queue (query, created_at, last_checkin, stale)
             VALUES (?1, ?2, ?2, 0)
             ON CONFLICT DO NOTHING",
            params![signature, &ts],
        )?;
        if inserted > 0 {
            log::debug!("Queued new advanced query entry");
        }
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM advanced_query_queue WHERE query = ?1 AND stale = 0"
        );
        self.conn
            .query_row(&sql, params![signature], entry_row_mapper)
            .map_err(Into::into)
    }

    /// Zero-based rank among live, unresolved entries ordered by id.
    pub fn pending_position(&self, id: QueueEntryId) -> StatsResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM advanced_query_queue
                 WHERE stale = 0 AND result_id IS NULL AND id < ?1",
                params![id],
                |r| r.get(0),
            )
            .map_err(Into::into)
    }

    /// Atomically take the oldest live, unresolved, unclaimed entry.
    pub fn claim_next_entry(&self, claim_token: &str) -> StatsResult<Option<ClaimedEntry>> {
        self.conn
            .query_row(
                "UPDATE advanced_query_queue
                 SET claim_token = ?1, claimed_at = ?2
                 WHERE id = (
                     SELECT id FROM advanced_query_queue
                     WHERE stale = 0 AND result_id IS NULL AND claim_token IS NULL
                     ORDER BY id LIMIT 1
                 )
                 AND claim_token IS NULL
                 RETURNING id, query, claim_token",
                params![claim_token, now()],
                |row| {
                    Ok(ClaimedEntry {
                        id: row.get(0)?,
                        query: row.get(1)?,
                        claim_token: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Persist a result and attach it to the entry, if `claim_token` still
    /// owns it. Both writes commit together or not at all.
    pub fn resolve_entry(
        &self,
        id: QueueEntryId,
        claim_token: &str,
        data_json: &str,
    ) -> StatsResult<String> {
        let result_id = uuid::Uuid::new_v4().to_string();
        let ts = now();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO advanced_query_result (result_id, data, created_at) VALUES (?1, ?2, ?3)",
            params![&result_id, data_json, &ts],
        )?;
        let updated = tx.execute(
            "UPDATE advanced_query_queue
             SET result_id = ?1, time_completed = ?2
             WHERE id = ?3 AND claim_token = ?4 AND result_id IS NULL",
            params![&result_id, &ts, id, claim_token],
        )?;
        if updated == 0 {
            return Err(StatsError::ConcurrencyConflict { entry_id: id });
        }
        tx.commit()?;
        Ok(result_id)
    }

    /// Give an unresolved entry back to the queue.
    pub fn release_claim(&self, id: QueueEntryId, claim_token: &str) -> StatsResult<bool> {
        let updated = self.conn.execute(
            "UPDATE advanced_query_queue SET claim_token = NULL, claimed_at = NULL
             WHERE id = ?1 AND claim_token = ?2 AND result_id IS NULL",
            params![id, claim_token],
        )?;
        Ok(updated > 0)
    }

    /// Retire an entry so the next identical request starts fresh.
    pub fn mark_stale(&self, id: QueueEntryId) -> StatsResult<bool> {
        let updated = self.conn.execute(
            "UPDATE advanced_query_queue SET stale = 1 WHERE id = ?1 AND stale = 0",
            params![id],
        )?;
        Ok(updated > 0)
    }

    pub fn checkin(&self, id: QueueEntryId) -> StatsResult<()> {
        self.conn.execute(
            "UPDATE advanced_query_queue SET last_checkin = ?1 WHERE id = ?2",
            params![now(), id],
        )?;
        Ok(())
    }

    pub fn queue_entry(&self, id: QueueEntryId) -> StatsResult<Option<QueueEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM advanced_query_queue WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], entry_row_mapper)
            .optional()
            .map_err(Into::into)
    }

    /// Entries of every state, stale ones included.
    pub fn queue_len(&self) -> StatsResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM advanced_query_queue", [], |r| r.get(0))
            .map_err(Into::into)
    }

    pub fn query_result(&self, result_id: &str) -> StatsResult<Option<QueryResultRecord>> {
        self.conn
            .query_row(
                "SELECT result_id, data, created_at FROM advanced_query_result WHERE result_id = ?1",
                params![result_id],
                |row| {
                    Ok(QueryResultRecord {
                        result_id: row.get(0)?,
                        data: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}
