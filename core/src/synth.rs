//! Synthetic corpus generation for the runner and tests.
//!
//! Same seed, same corpus. A configurable share of matches carries a
//! non-numeric rating so aggregation skip paths get exercised.

use crate::{
    error::StatsResult,
    opening::OpeningFlag,
    record::{MatchActionRecord, MatchRecord, RatingValue, TechRecord},
    rng::{CorpusRng, RngSlot},
    store::StatsStore,
    types::{CivId, LadderId, MapId, MatchId, PatchNumber, PlayerId, Seat},
};

/// Event type used for non-research actions (unit queued, building placed).
const OTHER_EVENT_TYPE: i64 = 1;

#[derive(Debug, Clone)]
pub struct CorpusSettings {
    pub matches: usize,
    pub players: i64,
    pub maps: Vec<MapId>,
    pub ladders: Vec<LadderId>,
    pub patches: Vec<PatchNumber>,
    pub malformed_rating_fraction: f64,
    pub tech_event_type: i64,
    pub techs: Vec<TechRecord>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        let tech = |id: i64, name: &str, duration_ms: i64| TechRecord {
            id,
            name: name.to_string(),
            duration_ms,
        };
        Self {
            matches: 1_000,
            players: 200,
            maps: vec![9, 29, 33],
            ladders: vec![3, 4],
            patches: vec![56005, 61591],
            malformed_rating_fraction: 0.01,
            tech_event_type: 3,
            techs: vec![
                tech(14, "Horse Collar", 20_000),
                tech(22, "Loom", 25_000),
                tech(101, "Feudal Age", 130_000),
                tech(102, "Castle Age", 160_000),
                tech(199, "Fletching", 30_000),
                tech(202, "Double-Bit Axe", 25_000),
                tech(213, "Wheelbarrow", 75_000),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticCorpus {
    pub matches: Vec<MatchRecord>,
    pub actions: Vec<MatchActionRecord>,
    pub techs: Vec<TechRecord>,
}

impl SyntheticCorpus {
    /// Write techs, matches and actions in dependency order.
    pub fn write_to(&self, store: &StatsStore) -> StatsResult<()> {
        for tech in &self.techs {
            store.insert_tech(tech)?;
        }
        store.insert_matches(&self.matches)?;
        store.insert_actions(&self.actions)?;
        log::info!(
            "Seeded {} matches, {} actions, {} techs",
            self.matches.len(),
            self.actions.len(),
            self.techs.len()
        );
        Ok(())
    }
}

pub struct CorpusGenerator {
    civs: Vec<CivId>,
    settings: CorpusSettings,
    matches_rng: CorpusRng,
    flags_rng: CorpusRng,
    actions_rng: CorpusRng,
    ratings_rng: CorpusRng,
}

impl CorpusGenerator {
    pub fn new(seed: u64, civs: Vec<CivId>, settings: CorpusSettings) -> Self {
        Self {
            civs,
            settings,
            matches_rng: CorpusRng::for_slot(seed, RngSlot::Matches),
            flags_rng: CorpusRng::for_slot(seed, RngSlot::Flags),
            actions_rng: CorpusRng::for_slot(seed, RngSlot::Actions),
            ratings_rng: CorpusRng::for_slot(seed, RngSlot::Ratings),
        }
    }

    fn pick<T: Copy>(rng: &mut CorpusRng, items: &[T], fallback: T) -> T {
        if items.is_empty() {
            return fallback;
        }
        items[rng.next_u64_below(items.len() as u64) as usize]
    }

    /// A plausible flag vector: one feudal opener, maybe a follow-up,
    /// maybe a fast castle.
    pub fn opening_flags(&mut self) -> u32 {
        use OpeningFlag::*;
        let rng = &mut self.flags_rng;
        let opener = match rng.next_u64_below(8) {
            0 => PremillDrush.mask(),
            1 => PostmillDrush.mask(),
            2 => Maa.mask(),
            3 => FeudalScoutOpening.mask(),
            4 => FeudalArcherOpening.mask(),
            5 => FeudalSkirmOpening.mask(),
            6 => FastCastle.mask(),
            _ => 0,
        };
        let mut flags = opener;
        if opener != FastCastle.mask() && opener != 0 {
            match rng.next_u64_below(5) {
                0 => flags |= FeudalArcherFollowup.mask(),
                1 => flags |= FeudalSkirmFollowup.mask(),
                2 => flags |= FeudalScoutFollowup.mask(),
                3 => flags |= FastCastle.mask(),
                _ => {}
            }
        }
        if rng.chance(0.02) {
            flags |= TowerRush.mask();
        }
        flags
    }

    fn rating(&mut self, match_id: MatchId) -> RatingValue {
        let rng = &mut self.ratings_rng;
        if rng.chance(self.settings.malformed_rating_fraction) {
            return RatingValue::Malformed(format!("unknown-{match_id}"));
        }
        let rating = rng.normal(1100.0, 250.0).clamp(100.0, 2800.0);
        RatingValue::Numeric(rating.round())
    }

    fn research_actions(&mut self, m: &MatchRecord, out: &mut Vec<MatchActionRecord>) {
        let mut actions = Vec::new();
        for seat in Seat::BOTH {
            let player_id = m.player_id(seat);
            for tech in &self.settings.techs {
                if !self.actions_rng.chance(0.7) {
                    continue;
                }
                let mean = (tech.duration_ms * 4) as f64;
                let time_ms = self.actions_rng.normal(mean, mean * 0.2).max(1_000.0) as i64;
                actions.push(MatchActionRecord {
                    match_id: m.id,
                    player_id,
                    event_type: self.settings.tech_event_type,
                    event_id: tech.id,
                    time_ms,
                });
            }
            if self.actions_rng.chance(0.5) {
                actions.push(MatchActionRecord {
                    match_id: m.id,
                    player_id,
                    event_type: OTHER_EVENT_TYPE,
                    event_id: self.actions_rng.range_i64(1, 900),
                    time_ms: self.actions_rng.range_i64(1_000, 900_000),
                });
            }
        }
        actions.sort_by_key(|a| a.time_ms);
        out.extend(actions);
    }

    pub fn generate(&mut self) -> SyntheticCorpus {
        let mut corpus = SyntheticCorpus {
            techs: self.settings.techs.clone(),
            ..SyntheticCorpus::default()
        };
        let players = self.settings.players.max(2);
        for i in 0..self.settings.matches {
            let id = i as MatchId + 1;
            let player1_id: PlayerId = self.matches_rng.range_i64(1, players);
            let mut player2_id: PlayerId = self.matches_rng.range_i64(1, players);
            if player2_id == player1_id {
                player2_id = player1_id % players + 1;
            }
            let player1_victory = self.matches_rng.chance(0.5);
            let m = MatchRecord {
                id,
                player1_id,
                player2_id,
                player1_civ: Self::pick(&mut self.matches_rng, &self.civs, 1),
                player2_civ: Self::pick(&mut self.matches_rng, &self.civs, 1),
                player1_flags: self.opening_flags(),
                player2_flags: self.opening_flags(),
                map_id: Self::pick(&mut self.matches_rng, &self.settings.maps, 9),
                ladder_id: Self::pick(&mut self.matches_rng, &self.settings.ladders, 3),
                patch: Self::pick(&mut self.matches_rng, &self.settings.patches, 1),
                rating: self.rating(id),
                player1_victory,
                player2_victory: !player1_victory,
            };
            self.research_actions(&m, &mut corpus.actions);
            corpus.matches.push(m);
        }
        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(seed: u64) -> CorpusGenerator {
        let settings = CorpusSettings {
            matches: 200,
            malformed_rating_fraction: 0.1,
            ..CorpusSettings::default()
        };
        CorpusGenerator::new(seed, (1..=8).collect(), settings)
    }

    #[test]
    fn same_seed_same_corpus() {
        let a = generator(42).generate();
        let b = generator(42).generate();
        assert_eq!(a.matches, b.matches);
        assert_eq!(a.actions, b.actions);
    }

    #[test]
    fn different_seeds_differ() {
        let a = generator(42).generate();
        let b = generator(43).generate();
        assert_ne!(a.matches, b.matches);
    }

    #[test]
    fn players_never_face_themselves() {
        let corpus = generator(7).generate();
        assert!(corpus.matches.iter().all(|m| m.player1_id != m.player2_id));
    }

    #[test]
    fn some_ratings_are_malformed() {
        let corpus = generator(7).generate();
        let malformed = corpus
            .matches
            .iter()
            .filter(|m| matches!(m.rating, RatingValue::Malformed(_)))
            .count();
        assert!(malformed > 0 && malformed < corpus.matches.len());
    }

    #[test]
    fn actions_are_grouped_by_match() {
        let corpus = generator(7).generate();
        let ids: Vec<MatchId> = corpus.actions.iter().map(|a| a.match_id).collect();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
    }
}
