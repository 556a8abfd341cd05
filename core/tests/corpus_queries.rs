//! Queries evaluated directly against the match corpus.

mod common;

use common::{config, game, store};
use openings_core::{
    evaluator::StatsEvaluator,
    opening::OpeningFlag::*,
    predicate::{Field, Predicate},
    record::RatingValue,
    request::{AdvancedRequest, StandardFilterParams},
};
use serde_json::json;

#[test]
fn pushed_down_filter_matches_in_memory_evaluation() {
    let store = store();
    let mut high = game(2, (3, 4), (Maa, PremillDrush), true);
    high.rating = RatingValue::Numeric(1800.0);
    high.map_id = 29;
    store
        .insert_matches(&[game(1, (1, 2), (PremillDrush, Maa), true), high])
        .expect("insert");

    let filter = Predicate::all_of([
        Predicate::one_of(Field::MapId, &[29, 33]),
        Predicate::equals(Field::Flag { seat: openings_core::types::Seat::One, bit: 3 }, true),
    ]);
    let mut seen = Vec::new();
    store
        .stream_matches(&filter, |m| {
            assert!(filter.evaluate(&m));
            seen.push(m.id);
            Ok(())
        })
        .expect("stream");
    assert_eq!(seen, vec![2]);
}

#[test]
fn player_records_count_either_seat() {
    let store = store();
    let mut swapped = game(2, (1, 2), (Maa, Maa), true);
    swapped.player1_id = 20;
    swapped.player2_id = 10;
    store
        .insert_matches(&[game(1, (1, 2), (Maa, Maa), true), swapped])
        .expect("insert");

    let config = config();
    let params =
        StandardFilterParams::from_query_str("include_player_ids=10", &config.tuning, Some(1)).expect("parse");
    let eval = StatsEvaluator::new(config)
        .player_records(&store, &params)
        .expect("evaluate");
    assert_eq!(eval.counters["player_10_total"], 2);
    assert_eq!(eval.counters["player_10_wins"], 1);
    assert_eq!(eval.counters["player_10_losses"], 1);
}

#[test]
fn advanced_query_skips_malformed_ratings() {
    let store = store();
    let mut bad = game(2, (1, 2), (PremillDrush, Maa), true);
    bad.rating = RatingValue::Malformed("unknown".into());
    store
        .insert_matches(&[game(1, (1, 2), (PremillDrush, Maa), true), bad])
        .expect("insert");

    let config = config();
    let req = AdvancedRequest::from_json(&json!({ "include_opening_ids_0": [0] }), &config.tuning)
        .expect("request");
    let eval = StatsEvaluator::new(config).run_advanced(&store, &req).expect("evaluate");
    let total = eval
        .counters
        .iter()
        .find(|(name, _)| name.ends_with("_total____0"))
        .map(|(_, v)| *v);
    assert_eq!(total, Some(1));
}

#[test]
fn anchored_player_binds_the_left_side() {
    let store = store();
    store
        .insert_matches(&[
            // Player 10 on premill drush, beats MAA.
            game(1, (1, 2), (PremillDrush, Maa), true),
            // Player 20 on premill drush; player 10 is the MAA side.
            game(2, (1, 2), (Maa, PremillDrush), true),
        ])
        .expect("insert");

    let config = config();
    let req = AdvancedRequest::from_json(
        &json!({ "left_player_id": 10, "include_opening_ids_0": [0], "include_opening_ids_1": [2] }),
        &config.tuning,
    )
    .expect("request");
    let eval = StatsEvaluator::new(config).run_advanced(&store, &req).expect("evaluate");
    assert_eq!(eval.counters["Premill_Drush_Any__vs__MAA_Any_total____0"], 1);
    assert_eq!(eval.counters["Premill_Drush_Any__vs__MAA_Any_wins____0"], 1);
}
