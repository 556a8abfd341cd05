//! Opening tech research builder.
//!
//! Streams tech-researched actions joined to their match and keeps a
//! running mean of research time per (opening, tech, slice). Actions
//! arrive grouped by match, so both players' openings are classified
//! once per match and reused until the match id changes.

use crate::{
    builder::{PassProgress, SummaryBuilder},
    classifier::{OpeningClassifier, OpeningSet},
    config::StatsConfig,
    error::{DataQualityIssue, StatsResult},
    record::{MatchActionRecord, MatchRecord},
    store::StatsStore,
    summary::{RunningMean, Slice, SummaryTable, TechStatKey},
    types::{rating_bucket, MatchId, Seat},
};
use std::collections::BTreeMap;

/// Single-entry memo of the last match's classified openings.
/// Invalidated only by a change of match id.
#[derive(Debug, Default)]
pub struct OpeningCache {
    entry: Option<(MatchId, [OpeningSet; 2])>,
    hits: u64,
    misses: u64,
}

impl OpeningCache {
    pub fn lookup(&mut self, classifier: &OpeningClassifier, m: &MatchRecord) -> &[OpeningSet; 2] {
        let hit = matches!(&self.entry, Some((id, _)) if *id == m.id);
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.entry = None;
        }
        let (_, sets) = self.entry.get_or_insert_with(|| {
            (
                m.id,
                [
                    classifier.classify(m.player1_flags),
                    classifier.classify(m.player2_flags),
                ],
            )
        });
        sets
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

pub struct TechStatBuilder {
    classifier: OpeningClassifier,
    rating_delta: i64,
    event_type: i64,
    cache: OpeningCache,
    stats: BTreeMap<TechStatKey, RunningMean>,
}

impl TechStatBuilder {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            classifier: OpeningClassifier::new(config.rules.clone()),
            rating_delta: config.tuning.rating_delta,
            event_type: config.tuning.tech_researched_event_type,
            cache: OpeningCache::default(),
            stats: BTreeMap::new(),
        }
    }

    /// Attribute one research action to every opening its player matched.
    pub fn observe(
        &mut self,
        action: &MatchActionRecord,
        m: &MatchRecord,
    ) -> Result<(), DataQualityIssue> {
        let seat = m.seat_of(action.player_id).ok_or(DataQualityIssue::UnknownActor {
            match_id: m.id,
            player_id: action.player_id,
        })?;
        let rating = m.rating.numeric(m.id)?;
        let slice = Slice {
            map_id: m.map_id,
            ladder_id: m.ladder_id,
            patch: m.patch,
            bucket: rating_bucket(rating, self.rating_delta),
        };
        let sets = self.cache.lookup(&self.classifier, m);
        let openings = match seat {
            Seat::One => &sets[0],
            Seat::Two => &sets[1],
        };
        for opening in openings.iter() {
            self.stats
                .entry(TechStatKey {
                    opening,
                    tech: action.event_id,
                    slice,
                })
                .or_default()
                .push(action.time_ms as f64);
        }
        Ok(())
    }

    pub fn stats(&self) -> &BTreeMap<TechStatKey, RunningMean> {
        &self.stats
    }

    pub fn cache(&self) -> &OpeningCache {
        &self.cache
    }
}

impl SummaryBuilder for TechStatBuilder {
    fn name(&self) -> &'static str {
        "opening_tech_stat"
    }

    fn table(&self) -> SummaryTable {
        SummaryTable::OpeningTechStat
    }

    fn scan(&mut self, store: &StatsStore, progress: &mut PassProgress) -> StatsResult<()> {
        store.stream_tech_actions(self.event_type, |action, m| {
            progress.record();
            if let Err(issue) = self.observe(action, m) {
                progress.skip(&issue);
            }
            Ok(())
        })?;
        log::debug!(
            "{}: opening cache {} hits, {} misses",
            self.name(),
            self.cache.hits(),
            self.cache.misses()
        );
        Ok(())
    }

    fn key_count(&self) -> usize {
        self.stats.len()
    }

    fn replace(&self, store: &StatsStore, rule_table_version: u32) -> StatsResult<usize> {
        store.replace_opening_tech_stats(self.stats.iter(), rule_table_version)
    }
}
