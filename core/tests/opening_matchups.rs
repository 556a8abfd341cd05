//! Opening matchup rebuild and the strategy queries over it.

mod common;

use common::{config, game, store};
use openings_core::{
    engine::AggregationEngine,
    evaluator::StatsEvaluator,
    opening::OpeningFlag::*,
    request::StandardFilterParams,
    summary::MatchupRow,
};

fn rows(store: &openings_core::store::StatsStore) -> Vec<MatchupRow> {
    let mut rows = Vec::new();
    store.for_each_matchup(|row| rows.push(row.clone())).expect("read");
    rows
}

#[test]
fn cells_are_stored_lower_index_first() {
    let store = store();
    // Fast castle (13) in seat one beats premill drush (0) in seat two.
    store
        .insert_match(&game(1, (1, 2), (FastCastle, PremillDrush), true))
        .expect("insert");
    AggregationEngine::new(config())
        .rebuild_opening_matchup_outcomes(&store)
        .expect("rebuild");

    let rows = rows(&store);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!((row.key.opening1, row.key.opening2), (0, 13));
    assert_eq!(row.tally.opening1_losses, 1);
    assert_eq!(row.tally.opening2_victories, 1);

    let fc = row.outcome_for(13, 0).expect("same pair");
    assert_eq!((fc.victories, fc.losses), (1, 0));
    assert!(row.outcome_for(1, 13).is_none());
}

#[test]
fn one_match_lands_in_every_matched_pair() {
    let store = store();
    // Scouts matches both Scouts_Any (3) and Scouts_No_Feudal_Followup (9).
    store
        .insert_match(&game(1, (1, 2), (PremillDrush, FeudalScoutOpening), false))
        .expect("insert");
    AggregationEngine::new(config())
        .rebuild_opening_matchup_outcomes(&store)
        .expect("rebuild");

    let mut pairs: Vec<_> = rows(&store)
        .iter()
        .map(|r| (r.key.opening1, r.key.opening2))
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![(0, 3), (0, 9)]);
}

#[test]
fn basic_strategy_counters_ignore_follow_up_partners() {
    let store = store();
    store
        .insert_matches(&[
            game(1, (1, 2), (FastCastle, PremillDrush), true),
            game(2, (1, 2), (PremillDrush, FeudalScoutOpening), true),
        ])
        .expect("insert");
    let config = config();
    AggregationEngine::new(config.clone())
        .rebuild_opening_matchup_outcomes(&store)
        .expect("rebuild");

    let params = StandardFilterParams::defaults(&config.tuning, Some(1));
    let eval = StatsEvaluator::new(config)
        .basic_strategies(&store, &params)
        .expect("evaluate");

    // (0, 13) and (0, 3) count; (0, 9) pairs with a follow-up and does not.
    assert_eq!(eval.counters["Premill_Drush_Any_total"], 2);
    assert_eq!(eval.counters["Premill_Drush_Any_wins"], 1);
    assert_eq!(eval.counters["Premill_Drush_Any_losses"], 1);
    assert_eq!(eval.counters["Scouts_Any_total"], 1);
    assert_eq!(eval.counters["Scouts_Any_losses"], 1);
    assert_eq!(eval.counters["total"], 2);
}

#[test]
fn opening_mirror_counts_both_players_without_a_winner() {
    let store = store();
    store
        .insert_match(&game(1, (1, 2), (FeudalArcherOpening, FeudalArcherOpening), true))
        .expect("insert");
    let config = config();
    AggregationEngine::new(config.clone())
        .rebuild_opening_matchup_outcomes(&store)
        .expect("rebuild");

    let params = StandardFilterParams::defaults(&config.tuning, Some(1));
    let eval = StatsEvaluator::new(config)
        .basic_strategies(&store, &params)
        .expect("evaluate");
    assert_eq!(eval.counters["Range_Opener_Any_total"], 2);
    assert_eq!(eval.counters["Range_Opener_Any_wins"], 0);
    assert_eq!(eval.counters["Range_Opener_Any_losses"], 0);
}

#[test]
fn matchup_grid_reads_pairs_in_either_direction() {
    let store = store();
    store
        .insert_matches(&[
            game(1, (1, 2), (PremillDrush, FeudalScoutOpening), false),
            game(2, (1, 2), (FeudalScoutOpening, PremillDrush), false),
        ])
        .expect("insert");
    let config = config();
    AggregationEngine::new(config.clone())
        .rebuild_opening_matchup_outcomes(&store)
        .expect("rebuild");

    let params =
        StandardFilterParams::from_query_str("include_opening_ids=0,3", &config.tuning, Some(1)).expect("parse");
    let eval = StatsEvaluator::new(config)
        .opening_matchups(&store, &params)
        .expect("evaluate");
    assert_eq!(eval.counters["Premill_Drush_Any_vs_Scouts_Any_total"], 2);
    assert_eq!(eval.counters["Premill_Drush_Any_vs_Scouts_Any_wins"], 1);
    assert_eq!(eval.counters["Premill_Drush_Any_vs_Scouts_Any_losses"], 1);
}
