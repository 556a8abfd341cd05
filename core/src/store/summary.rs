use super::StatsStore;
use crate::{
    error::StatsResult,
    summary::{
        CivOutcomeKey, CivOutcomeRow, MatchupKey, MatchupRow, MatchupTally, RunningMean, Slice,
        SummaryMeta, SummaryTable, TechStatKey, TechStatRow, WinLoss,
    },
};
use rusqlite::params;

// Slice columns are always selected last, in this order.
fn slice_from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Slice> {
    Ok(Slice {
        map_id: row.get(offset)?,
        ladder_id: row.get(offset + 1)?,
        patch: row.get(offset + 2)?,
        bucket: row.get(offset + 3)?,
    })
}

impl StatsStore {
    // ── Bulk replace ───────────────────────────────────────────────
    //
    // Each replace is DELETE + INSERT + meta upsert in one transaction.
    // Readers on other connections see the old table or the new one.

    fn write_meta(
        tx: &rusqlite::Transaction<'_>,
        table: SummaryTable,
        rule_table_version: u32,
        rows: usize,
    ) -> StatsResult<()> {
        tx.execute(
            "INSERT INTO summary_meta (table_name, rule_table_version, rows, rebuilt_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(table_name) DO UPDATE SET
                rule_table_version = excluded.rule_table_version,
                rows = excluded.rows,
                rebuilt_at = excluded.rebuilt_at",
            params![
                table.name(),
                rule_table_version,
                rows as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn replace_civ_outcomes<'a, I>(&self, rows: I, rule_table_version: u32) -> StatsResult<usize>
    where
        I: IntoIterator<Item = (&'a CivOutcomeKey, &'a WinLoss)>,
    {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM civ_outcome", [])?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO civ_outcome
                    (civilization, map_id, ladder_id, patch_number, rating, victories, losses)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (key, outcome) in rows {
                let s = &key.slice;
                stmt.execute(params![
                    key.civ,
                    s.map_id,
                    s.ladder_id,
                    s.patch,
                    s.bucket,
                    outcome.victories,
                    outcome.losses,
                ])?;
                written += 1;
            }
        }
        Self::write_meta(&tx, SummaryTable::CivOutcome, rule_table_version, written)?;
        tx.commit()?;
        Ok(written)
    }

    pub fn replace_opening_matchups<'a, I>(
        &self,
        rows: I,
        rule_table_version: u32,
    ) -> StatsResult<usize>
    where
        I: IntoIterator<Item = (&'a MatchupKey, &'a MatchupTally)>,
    {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM opening_matchup_outcome", [])?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO opening_matchup_outcome
                    (opening1_id, opening2_id, map_id, ladder_id, patch_number, rating,
                     opening1_victories, opening1_losses, opening2_victories, opening2_losses)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (key, t) in rows {
                let s = &key.slice;
                stmt.execute(params![
                    key.opening1 as i64,
                    key.opening2 as i64,
                    s.map_id,
                    s.ladder_id,
                    s.patch,
                    s.bucket,
                    t.opening1_victories,
                    t.opening1_losses,
                    t.opening2_victories,
                    t.opening2_losses,
                ])?;
                written += 1;
            }
        }
        Self::write_meta(&tx, SummaryTable::OpeningMatchupOutcome, rule_table_version, written)?;
        tx.commit()?;
        Ok(written)
    }

    pub fn replace_opening_tech_stats<'a, I>(
        &self,
        rows: I,
        rule_table_version: u32,
    ) -> StatsResult<usize>
    where
        I: IntoIterator<Item = (&'a TechStatKey, &'a RunningMean)>,
    {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM opening_tech_stat", [])?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO opening_tech_stat
                    (opening_id, tech_id, map_id, ladder_id, patch_number, rating,
                     research_count, average_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (key, stat) in rows {
                let s = &key.slice;
                stmt.execute(params![
                    key.opening as i64,
                    key.tech,
                    s.map_id,
                    s.ladder_id,
                    s.patch,
                    s.bucket,
                    stat.count,
                    stat.mean,
                ])?;
                written += 1;
            }
        }
        Self::write_meta(&tx, SummaryTable::OpeningTechStat, rule_table_version, written)?;
        tx.commit()?;
        Ok(written)
    }

    // ── Summary reads ──────────────────────────────────────────────

    pub fn for_each_civ_outcome<F>(&self, mut visit: F) -> StatsResult<u64>
    where
        F: FnMut(&CivOutcomeRow),
    {
        let mut stmt = self.conn.prepare(
            "SELECT civilization, victories, losses, map_id, ladder_id, patch_number, rating
             FROM civ_outcome",
        )?;
        let mut rows = stmt.query([])?;
        let mut seen = 0u64;
        while let Some(row) = rows.next()? {
            visit(&CivOutcomeRow {
                key: CivOutcomeKey {
                    civ: row.get(0)?,
                    slice: slice_from_row(row, 3)?,
                },
                outcome: WinLoss {
                    victories: row.get(1)?,
                    losses: row.get(2)?,
                },
            });
            seen += 1;
        }
        Ok(seen)
    }

    pub fn for_each_matchup<F>(&self, mut visit: F) -> StatsResult<u64>
    where
        F: FnMut(&MatchupRow),
    {
        let mut stmt = self.conn.prepare(
            "SELECT opening1_id, opening2_id,
                    opening1_victories, opening1_losses, opening2_victories, opening2_losses,
                    map_id, ladder_id, patch_number, rating
             FROM opening_matchup_outcome",
        )?;
        let mut rows = stmt.query([])?;
        let mut seen = 0u64;
        while let Some(row) = rows.next()? {
            visit(&MatchupRow {
                key: MatchupKey {
                    opening1: row.get::<_, i64>(0)? as usize,
                    opening2: row.get::<_, i64>(1)? as usize,
                    slice: slice_from_row(row, 6)?,
                },
                tally: MatchupTally {
                    opening1_victories: row.get(2)?,
                    opening1_losses: row.get(3)?,
                    opening2_victories: row.get(4)?,
                    opening2_losses: row.get(5)?,
                },
            });
            seen += 1;
        }
        Ok(seen)
    }

    pub fn for_each_tech_stat<F>(&self, mut visit: F) -> StatsResult<u64>
    where
        F: FnMut(&TechStatRow),
    {
        let mut stmt = self.conn.prepare(
            "SELECT opening_id, tech_id, research_count, average_time,
                    map_id, ladder_id, patch_number, rating
             FROM opening_tech_stat",
        )?;
        let mut rows = stmt.query([])?;
        let mut seen = 0u64;
        while let Some(row) = rows.next()? {
            visit(&TechStatRow {
                key: TechStatKey {
                    opening: row.get::<_, i64>(0)? as usize,
                    tech: row.get(1)?,
                    slice: slice_from_row(row, 4)?,
                },
                stat: RunningMean {
                    count: row.get(2)?,
                    mean: row.get(3)?,
                },
            });
            seen += 1;
        }
        Ok(seen)
    }

    pub fn summary_meta(&self, table: SummaryTable) -> StatsResult<Option<SummaryMeta>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, rule_table_version, rows, rebuilt_at
             FROM summary_meta WHERE table_name = ?1",
        )?;
        let mut rows = stmt.query(params![table.name()])?;
        match rows.next()? {
            Some(row) => Ok(Some(SummaryMeta {
                table: row.get(0)?,
                rule_table_version: row.get(1)?,
                rows: row.get(2)?,
                rebuilt_at: row.get(3)?,
            })),
            None => Ok(None),
        }
    }
}
