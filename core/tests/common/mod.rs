#![allow(dead_code)]

use openings_core::{
    config::StatsConfig,
    opening::OpeningFlag,
    record::{MatchActionRecord, MatchRecord, RatingValue},
    store::StatsStore,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn store() -> StatsStore {
    init_logging();
    let store = StatsStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

pub fn config() -> StatsConfig {
    StatsConfig::default_test()
}

/// A 1000-rated match on map 9, ladder 3, patch 1. Player 10 sits in
/// seat one, player 20 in seat two.
pub fn game(id: i64, civs: (i64, i64), flags: (OpeningFlag, OpeningFlag), p1_wins: bool) -> MatchRecord {
    MatchRecord {
        id,
        player1_id: 10,
        player2_id: 20,
        player1_civ: civs.0,
        player2_civ: civs.1,
        player1_flags: flags.0.mask(),
        player2_flags: flags.1.mask(),
        map_id: 9,
        ladder_id: 3,
        patch: 1,
        rating: RatingValue::Numeric(1000.0),
        player1_victory: p1_wins,
        player2_victory: !p1_wins,
    }
}

pub fn research(match_id: i64, player_id: i64, tech: i64, time_ms: i64) -> MatchActionRecord {
    MatchActionRecord {
        match_id,
        player_id,
        event_type: 3,
        event_id: tech,
        time_ms,
    }
}
