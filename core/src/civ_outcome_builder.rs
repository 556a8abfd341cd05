//! Civilization outcome builder.
//!
//! Mirror matches (both players on the same civilization) are left out
//! entirely so a civilization is never scored against itself.

use crate::{
    builder::{PassProgress, SummaryBuilder},
    config::StatsConfig,
    error::{DataQualityIssue, StatsResult},
    predicate::Predicate,
    record::MatchRecord,
    store::StatsStore,
    summary::{CivOutcomeKey, Slice, SummaryTable, WinLoss},
    types::{rating_bucket, Seat},
};
use std::collections::BTreeMap;

pub struct CivOutcomeBuilder {
    rating_delta: i64,
    outcomes: BTreeMap<CivOutcomeKey, WinLoss>,
}

impl CivOutcomeBuilder {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            rating_delta: config.tuning.rating_delta,
            outcomes: BTreeMap::new(),
        }
    }

    /// Fold one match into the tallies. Returns `false` for skipped mirrors.
    pub fn observe(&mut self, m: &MatchRecord) -> Result<bool, DataQualityIssue> {
        if m.is_civ_mirror() {
            return Ok(false);
        }
        let rating = m.rating.numeric(m.id)?;
        let slice = Slice {
            map_id: m.map_id,
            ladder_id: m.ladder_id,
            patch: m.patch,
            bucket: rating_bucket(rating, self.rating_delta),
        };
        for seat in Seat::BOTH {
            self.outcomes
                .entry(CivOutcomeKey { civ: m.civ(seat), slice })
                .or_default()
                .record(m.victory(seat));
        }
        Ok(true)
    }

    pub fn outcomes(&self) -> &BTreeMap<CivOutcomeKey, WinLoss> {
        &self.outcomes
    }
}

impl SummaryBuilder for CivOutcomeBuilder {
    fn name(&self) -> &'static str {
        "civ_outcome"
    }

    fn table(&self) -> SummaryTable {
        SummaryTable::CivOutcome
    }

    fn scan(&mut self, store: &StatsStore, progress: &mut PassProgress) -> StatsResult<()> {
        store.stream_matches(&Predicate::always(), |m| {
            progress.record();
            if let Err(issue) = self.observe(&m) {
                progress.skip(&issue);
            }
            Ok(())
        })?;
        Ok(())
    }

    fn key_count(&self) -> usize {
        self.outcomes.len()
    }

    fn replace(&self, store: &StatsStore, rule_table_version: u32) -> StatsResult<usize> {
        store.replace_civ_outcomes(self.outcomes.iter(), rule_table_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RatingValue;

    fn game(id: i64, civs: (i64, i64), p1_wins: bool) -> MatchRecord {
        MatchRecord {
            id,
            player1_id: 10,
            player2_id: 20,
            player1_civ: civs.0,
            player2_civ: civs.1,
            player1_flags: 0,
            player2_flags: 0,
            map_id: 9,
            ladder_id: 1,
            patch: 1,
            rating: RatingValue::Numeric(1274.0),
            player1_victory: p1_wins,
            player2_victory: !p1_wins,
        }
    }

    #[test]
    fn mirrors_are_never_counted() {
        let mut b = CivOutcomeBuilder::new(&StatsConfig::default_test());
        assert_eq!(b.observe(&game(1, (3, 3), true)), Ok(false));
        assert!(b.outcomes().is_empty());
    }

    #[test]
    fn both_players_are_scored_independently() {
        let mut b = CivOutcomeBuilder::new(&StatsConfig::default_test());
        b.observe(&game(1, (1, 2), true)).expect("valid");
        let by_civ: BTreeMap<i64, WinLoss> =
            b.outcomes().iter().map(|(k, v)| (k.civ, *v)).collect();
        assert_eq!(by_civ[&1], WinLoss { victories: 1, losses: 0 });
        assert_eq!(by_civ[&2], WinLoss { victories: 0, losses: 1 });
        assert!(b.outcomes().keys().all(|k| k.slice.bucket == 1250));
    }

    #[test]
    fn malformed_rating_is_reported() {
        let mut b = CivOutcomeBuilder::new(&StatsConfig::default_test());
        let mut m = game(4, (1, 2), true);
        m.rating = RatingValue::Malformed("unknown".into());
        assert!(matches!(
            b.observe(&m),
            Err(DataQualityIssue::MalformedRating { match_id: 4, .. })
        ));
        assert!(b.outcomes().is_empty());
    }
}
