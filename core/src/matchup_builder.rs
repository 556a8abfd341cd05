//! Opening matchup outcome builder.
//!
//! Every (player1 opening, player2 opening) pair from the two classified
//! sets gets a cell, so one match can land in several cells. Cells are
//! stored lower index first with victory attribution swapped to match.

use crate::{
    builder::{PassProgress, SummaryBuilder},
    classifier::OpeningClassifier,
    config::StatsConfig,
    error::{DataQualityIssue, StatsResult},
    predicate::Predicate,
    record::MatchRecord,
    store::StatsStore,
    summary::{MatchupKey, MatchupTally, Slice, SummaryTable},
    types::rating_bucket,
};
use std::collections::BTreeMap;

pub struct MatchupBuilder {
    classifier: OpeningClassifier,
    rating_delta: i64,
    cells: BTreeMap<MatchupKey, MatchupTally>,
}

impl MatchupBuilder {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            classifier: OpeningClassifier::new(config.rules.clone()),
            rating_delta: config.tuning.rating_delta,
            cells: BTreeMap::new(),
        }
    }

    pub fn observe(&mut self, m: &MatchRecord) -> Result<(), DataQualityIssue> {
        let rating = m.rating.numeric(m.id)?;
        let slice = Slice {
            map_id: m.map_id,
            ladder_id: m.ladder_id,
            patch: m.patch,
            bucket: rating_bucket(rating, self.rating_delta),
        };
        let left = self.classifier.classify(m.player1_flags);
        let right = self.classifier.classify(m.player2_flags);
        for a in left.iter() {
            for b in right.iter() {
                let (key, swapped) = MatchupKey::canonical(a, b, slice);
                let opening1_won = if swapped {
                    m.player2_victory
                } else {
                    m.player1_victory
                };
                self.cells.entry(key).or_default().record(opening1_won);
            }
        }
        Ok(())
    }

    pub fn cells(&self) -> &BTreeMap<MatchupKey, MatchupTally> {
        &self.cells
    }
}

impl SummaryBuilder for MatchupBuilder {
    fn name(&self) -> &'static str {
        "opening_matchup_outcome"
    }

    fn table(&self) -> SummaryTable {
        SummaryTable::OpeningMatchupOutcome
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
        self.cells.len()
    }

    fn replace(&self, store: &StatsStore, rule_table_version: u32) -> StatsResult<usize> {
        store.replace_opening_matchups(self.cells.iter(), rule_table_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opening::OpeningFlag::*;
    use crate::record::RatingValue;

    fn game(p1_flags: u32, p2_flags: u32, p1_wins: bool) -> MatchRecord {
        MatchRecord {
            id: 1,
            player1_id: 10,
            player2_id: 20,
            player1_civ: 1,
            player2_civ: 2,
            player1_flags: p1_flags,
            player2_flags: p2_flags,
            map_id: 9,
            ladder_id: 3,
            patch: 1,
            rating: RatingValue::Numeric(1000.0),
            player1_victory: p1_wins,
            player2_victory: !p1_wins,
        }
    }

    #[test]
    fn higher_index_on_seat_one_is_swapped() {
        let config = StatsConfig::default_test();
        let maa = config.rules.index_of("MAA_Any").expect("rule");
        let drush = config.rules.index_of("Premill_Drush_Any").expect("rule");
        assert!(drush < maa);

        let mut b = MatchupBuilder::new(&config);
        b.observe(&game(Maa.mask(), PremillDrush.mask(), true)).expect("valid");
        let (_, tally) = b
            .cells()
            .iter()
            .find(|(k, _)| (k.opening1, k.opening2) == (drush, maa))
            .expect("drush vs maa cell");
        assert_eq!(tally.opening2_victories, 1);
        assert_eq!(tally.opening1_losses, 1);
    }

    #[test]
    fn multi_label_players_fan_out() {
        let config = StatsConfig::default_test();
        let mut b = MatchupBuilder::new(&config);
        // MAA_Any and MAA_Range_Followup against an unclassified player.
        b.observe(&game(Maa.mask() | FeudalArcherFollowup.mask(), 0, false))
            .expect("valid");
        assert_eq!(b.cells().len(), 2);
        assert!(b.cells().values().all(|t| t.games() == 1));
    }
}
