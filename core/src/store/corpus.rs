use super::{pushdown, StatsStore};
use crate::{
    error::StatsResult,
    predicate::Predicate,
    record::{MatchActionRecord, MatchRecord, RatingValue, TechRecord},
    types::{PatchNumber, TechId},
};
use rusqlite::{params, params_from_iter, types::Value as SqlValue};

const MATCH_COLUMNS: &str = "m.id, m.player1_id, m.player2_id, m.player1_civilization,
    m.player2_civilization, m.player1_flags, m.player2_flags, m.map_id, m.ladder_id,
    m.patch_number, m.average_rating, m.player1_victory, m.player2_victory";

fn rating_from_sql(value: SqlValue) -> RatingValue {
    match value {
        SqlValue::Integer(v) => RatingValue::Numeric(v as f64),
        SqlValue::Real(v) => RatingValue::Numeric(v),
        SqlValue::Text(raw) => RatingValue::Malformed(raw),
        SqlValue::Null => RatingValue::Malformed(String::new()),
        SqlValue::Blob(bytes) => RatingValue::Malformed(format!("<{} byte blob>", bytes.len())),
    }
}

fn rating_to_sql(rating: &RatingValue) -> SqlValue {
    match rating {
        RatingValue::Numeric(v) => SqlValue::Real(*v),
        RatingValue::Malformed(raw) => SqlValue::Text(raw.clone()),
    }
}

// Expects the columns of MATCH_COLUMNS starting at `offset`.
fn match_row_mapper(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: row.get(offset)?,
        player1_id: row.get(offset + 1)?,
        player2_id: row.get(offset + 2)?,
        player1_civ: row.get(offset + 3)?,
        player2_civ: row.get(offset + 4)?,
        player1_flags: row.get::<_, i64>(offset + 5)? as u32,
        player2_flags: row.get::<_, i64>(offset + 6)? as u32,
        map_id: row.get(offset + 7)?,
        ladder_id: row.get(offset + 8)?,
        patch: row.get(offset + 9)?,
        rating: rating_from_sql(row.get(offset + 10)?),
        player1_victory: row.get::<_, i32>(offset + 11)? != 0,
        player2_victory: row.get::<_, i32>(offset + 12)? != 0,
    })
}

impl StatsStore {
    // ── Corpus writes (ingestion and synthetic seeding) ────────────

    pub fn insert_match(&self, m: &MatchRecord) -> StatsResult<()> {
        self.conn.execute(
            "INSERT INTO matches (
                id, player1_id, player2_id, player1_civilization, player2_civilization,
                player1_flags, player2_flags, map_id, ladder_id, patch_number,
                average_rating, player1_victory, player2_victory
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                m.id,
                m.player1_id,
                m.player2_id,
                m.player1_civ,
                m.player2_civ,
                m.player1_flags as i64,
                m.player2_flags as i64,
                m.map_id,
                m.ladder_id,
                m.patch,
                rating_to_sql(&m.rating),
                if m.player1_victory { 1i32 } else { 0i32 },
                if m.player2_victory { 1i32 } else { 0i32 },
            ],
        )?;
        Ok(())
    }

    /// Insert a batch of matches in one transaction.
    pub fn insert_matches(&self, matches: &[MatchRecord]) -> StatsResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for m in matches {
            self.insert_match(m)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert actions in one transaction, preserving slice order as id order.
    pub fn insert_actions(&self, actions: &[MatchActionRecord]) -> StatsResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO match_actions (match_id, player_id, event_type, event_id, time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for a in actions {
                stmt.execute(params![a.match_id, a.player_id, a.event_type, a.event_id, a.time_ms])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_tech(&self, tech: &TechRecord) -> StatsResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO techs (id, name, duration_ms) VALUES (?1, ?2, ?3)",
            params![tech.id, &tech.name, tech.duration_ms],
        )?;
        Ok(())
    }

    // ── Corpus reads ───────────────────────────────────────────────

    pub fn match_count(&self) -> StatsResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM matches", [], |r| r.get(0))
            .map_err(Into::into)
    }

    pub fn action_count(&self) -> StatsResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM match_actions", [], |r| r.get(0))
            .map_err(Into::into)
    }

    /// Highest patch number present in the corpus.
    pub fn latest_patch(&self) -> StatsResult<Option<PatchNumber>> {
        self.conn
            .query_row("SELECT MAX(patch_number) FROM matches", [], |r| r.get(0))
            .map_err(Into::into)
    }

    pub fn known_techs(&self) -> StatsResult<Vec<TechRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, duration_ms FROM techs ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(TechRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                duration_ms: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_match(&self, id: crate::types::MatchId) -> StatsResult<Option<MatchRecord>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches m WHERE m.id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(match_row_mapper(row, 0)?)),
            None => Ok(None),
        }
    }

    /// Walk every match accepted by `filter` with a forward-only cursor.
    /// The filter is evaluated by SQLite; nothing is buffered here.
    /// Returns the number of rows visited.
    pub fn stream_matches<F>(&self, filter: &Predicate, mut visit: F) -> StatsResult<u64>
    where
        F: FnMut(MatchRecord) -> StatsResult<()>,
    {
        let rendered = pushdown::render(filter, "m")?;
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches m WHERE {} ORDER BY m.id",
            rendered.clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(rendered.params.iter()))?;
        let mut seen = 0u64;
        while let Some(row) = rows.next()? {
            visit(match_row_mapper(row, 0)?)?;
            seen += 1;
        }
        Ok(seen)
    }

    /// Walk tech-research actions for catalogued techs, joined to their
    /// match, grouped by match and in recorded order within a match.
    pub fn stream_tech_actions<F>(&self, event_type: i64, mut visit: F) -> StatsResult<u64>
    where
        F: FnMut(&MatchActionRecord, &MatchRecord) -> StatsResult<()>,
    {
        let sql = format!(
            "SELECT a.match_id, a.player_id, a.event_type, a.event_id, a.time_ms, {MATCH_COLUMNS}
             FROM match_actions a
             JOIN matches m ON m.id = a.match_id
             WHERE a.event_type = ?1
               AND a.event_id IN (SELECT id FROM techs)
             ORDER BY a.match_id, a.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![event_type])?;
        let mut seen = 0u64;
        while let Some(row) = rows.next()? {
            let action = MatchActionRecord {
                match_id: row.get(0)?,
                player_id: row.get(1)?,
                event_type: row.get(2)?,
                event_id: row.get::<_, TechId>(3)?,
                time_ms: row.get(4)?,
            };
            let parent = match_row_mapper(row, 5)?;
            visit(&action, &parent)?;
            seen += 1;
        }
        Ok(seen)
    }
}
