//! Derived summary tables and their in-memory tallies.
//!
//! Summary tables are owned by the aggregation engine and replaced
//! wholesale on every rebuild. Nothing patches them incrementally.

use crate::{
    predicate::{Field, Row, Value},
    types::{CivId, LadderId, MapId, OpeningIndex, PatchNumber, RatingBucket, TechId},
};
use serde::{Deserialize, Serialize};

/// The grouping dimensions shared by every summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slice {
    pub map_id: MapId,
    pub ladder_id: LadderId,
    pub patch: PatchNumber,
    pub bucket: RatingBucket,
}

impl Slice {
    fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::MapId => Some(Value::Int(self.map_id)),
            Field::LadderId => Some(Value::Int(self.ladder_id)),
            Field::Patch => Some(Value::Int(self.patch)),
            Field::Rating => Some(Value::Int(self.bucket)),
            _ => None,
        }
    }
}

// ── Civilization outcome ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinLoss {
    pub victories: i64,
    pub losses: i64,
}

impl WinLoss {
    pub fn record(&mut self, won: bool) {
        if won {
            self.victories += 1;
        } else {
            self.losses += 1;
        }
    }

    pub fn total(&self) -> i64 {
        self.victories + self.losses
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CivOutcomeKey {
    pub civ: CivId,
    pub slice: Slice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CivOutcomeRow {
    pub key: CivOutcomeKey,
    pub outcome: WinLoss,
}

impl Row for CivOutcomeRow {
    fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Civilization => Some(Value::Int(self.key.civ)),
            Field::Victories => Some(Value::Int(self.outcome.victories)),
            Field::Losses => Some(Value::Int(self.outcome.losses)),
            other => self.key.slice.get(other),
        }
    }
}

// ── Opening matchup outcome ──────────────────────────────────────────────────

/// Counters for a canonical (lower index, higher index) opening pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchupTally {
    pub opening1_victories: i64,
    pub opening1_losses: i64,
    pub opening2_victories: i64,
    pub opening2_losses: i64,
}

impl MatchupTally {
    /// Record one game from the lower-index opening's point of view.
    pub fn record(&mut self, opening1_won: bool) {
        if opening1_won {
            self.opening1_victories += 1;
            self.opening2_losses += 1;
        } else {
            self.opening1_losses += 1;
            self.opening2_victories += 1;
        }
    }

    pub fn games(&self) -> i64 {
        self.opening1_victories + self.opening1_losses
    }
}

/// Invariant: `opening1 <= opening2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchupKey {
    pub opening1: OpeningIndex,
    pub opening2: OpeningIndex,
    pub slice: Slice,
}

impl MatchupKey {
    /// Orders the pair lower-first. Returns the key and whether the
    /// caller's first opening ended up in the second position.
    pub fn canonical(a: OpeningIndex, b: OpeningIndex, slice: Slice) -> (Self, bool) {
        if a > b {
            (Self { opening1: b, opening2: a, slice }, true)
        } else {
            (Self { opening1: a, opening2: b, slice }, false)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupRow {
    pub key: MatchupKey,
    pub tally: MatchupTally,
}

impl MatchupRow {
    /// Win/loss of `opening` against `opponent`, whichever order they were
    /// stored in. `None` if this row is a different pair.
    pub fn outcome_for(&self, opening: OpeningIndex, opponent: OpeningIndex) -> Option<WinLoss> {
        let (key, swapped) = MatchupKey::canonical(opening, opponent, self.key.slice);
        if key != self.key {
            return None;
        }
        Some(if swapped {
            WinLoss {
                victories: self.tally.opening2_victories,
                losses: self.tally.opening2_losses,
            }
        } else {
            WinLoss {
                victories: self.tally.opening1_victories,
                losses: self.tally.opening1_losses,
            }
        })
    }
}

impl Row for MatchupRow {
    fn get(&self, field: Field) -> Option<Value> {
        let v = |n: i64| Some(Value::Int(n));
        match field {
            Field::Opening1 => v(self.key.opening1 as i64),
            Field::Opening2 => v(self.key.opening2 as i64),
            Field::Opening1Victories => v(self.tally.opening1_victories),
            Field::Opening1Losses => v(self.tally.opening1_losses),
            Field::Opening2Victories => v(self.tally.opening2_victories),
            Field::Opening2Losses => v(self.tally.opening2_losses),
            other => self.key.slice.get(other),
        }
    }
}

// ── Opening tech research ────────────────────────────────────────────────────

/// Incrementally maintained mean. Never replays raw samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    pub count: i64,
    pub mean: f64,
}

impl RunningMean {
    pub fn push(&mut self, sample: f64) {
        self.mean = (self.mean * self.count as f64 + sample) / (self.count + 1) as f64;
        self.count += 1;
    }

    /// Count-weighted combination of two means.
    pub fn merge(&mut self, other: &RunningMean) {
        let total = self.count + other.count;
        if total == 0 {
            return;
        }
        self.mean = (self.mean * self.count as f64 + other.mean * other.count as f64) / total as f64;
        self.count = total;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TechStatKey {
    pub opening: OpeningIndex,
    pub tech: TechId,
    pub slice: Slice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStatRow {
    pub key: TechStatKey,
    pub stat: RunningMean,
}

impl Row for TechStatRow {
    fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Opening => Some(Value::Int(self.key.opening as i64)),
            Field::Tech => Some(Value::Int(self.key.tech)),
            Field::ResearchCount => Some(Value::Int(self.stat.count)),
            other => self.key.slice.get(other),
        }
    }
}

// ── Bookkeeping ──────────────────────────────────────────────────────────────

/// Stable table names, also used as `summary_meta` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTable {
    CivOutcome,
    OpeningMatchupOutcome,
    OpeningTechStat,
}

impl SummaryTable {
    pub fn name(self) -> &'static str {
        match self {
            SummaryTable::CivOutcome => "civ_outcome",
            SummaryTable::OpeningMatchupOutcome => "opening_matchup_outcome",
            SummaryTable::OpeningTechStat => "opening_tech_stat",
        }
    }
}

/// Written alongside each replace, inside the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMeta {
    pub table: String,
    pub rule_table_version: u32,
    pub rows: i64,
    pub rebuilt_at: String,
}

/// Outcome of one rebuild pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub builder: String,
    pub scanned: u64,
    pub skipped: u64,
    pub keys: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{CorpusRng, RngSlot};

    fn slice() -> Slice {
        Slice { map_id: 9, ladder_id: 3, patch: 1, bucket: 1250 }
    }

    #[test]
    fn running_mean_matches_arithmetic_mean() {
        let mut m = RunningMean::default();
        for x in [10.0, 20.0, 60.0] {
            m.push(x);
        }
        assert_eq!(m.count, 3);
        assert!((m.mean - 30.0).abs() < 1e-9);
    }

    #[test]
    fn running_mean_is_order_independent() {
        let mut rng = CorpusRng::for_slot(0xABCD, RngSlot::Actions);
        let samples: Vec<f64> = (0..500).map(|_| rng.range_i64(60_000, 900_000) as f64).collect();

        let mut forward = RunningMean::default();
        samples.iter().for_each(|s| forward.push(*s));

        let mut backward = RunningMean::default();
        samples.iter().rev().for_each(|s| backward.push(*s));

        let mut shuffled = samples.clone();
        for i in (1..shuffled.len()).rev() {
            let j = rng.next_u64_below(i as u64 + 1) as usize;
            shuffled.swap(i, j);
        }
        let mut mixed = RunningMean::default();
        shuffled.iter().for_each(|s| mixed.push(*s));

        assert_eq!(forward.count, backward.count);
        assert_eq!(forward.count, mixed.count);
        assert!((forward.mean - backward.mean).abs() < 1e-6);
        assert!((forward.mean - mixed.mean).abs() < 1e-6);
    }

    #[test]
    fn merge_is_count_weighted() {
        let mut a = RunningMean { count: 3, mean: 10.0 };
        a.merge(&RunningMean { count: 1, mean: 30.0 });
        assert_eq!(a.count, 4);
        assert!((a.mean - 15.0).abs() < 1e-9);

        let mut empty = RunningMean::default();
        empty.merge(&RunningMean::default());
        assert_eq!(empty, RunningMean::default());
    }

    #[test]
    fn canonical_key_puts_lower_index_first() {
        let (key, swapped) = MatchupKey::canonical(7, 2, slice());
        assert_eq!((key.opening1, key.opening2), (2, 7));
        assert!(swapped);

        let (key, swapped) = MatchupKey::canonical(2, 2, slice());
        assert_eq!((key.opening1, key.opening2), (2, 2));
        assert!(!swapped);
    }

    #[test]
    fn unordered_lookup_swaps_attribution() {
        let mut tally = MatchupTally::default();
        tally.record(true);
        tally.record(true);
        tally.record(false);
        let (key, _) = MatchupKey::canonical(2, 7, slice());
        let row = MatchupRow { key, tally };

        let low = row.outcome_for(2, 7).expect("same pair");
        let high = row.outcome_for(7, 2).expect("same pair");
        assert_eq!(low, WinLoss { victories: 2, losses: 1 });
        assert_eq!(high, WinLoss { victories: 1, losses: 2 });
        assert!(row.outcome_for(2, 8).is_none());
    }
}
