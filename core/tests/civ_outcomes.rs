//! Civilization outcome rebuild and the win-rate query over it.

mod common;

use common::{config, game, store};
use openings_core::{
    engine::AggregationEngine,
    evaluator::StatsEvaluator,
    opening::OpeningFlag::*,
    record::RatingValue,
    request::StandardFilterParams,
    summary::SummaryTable,
};

fn seed_three_games(store: &openings_core::store::StatsStore) {
    store
        .insert_matches(&[
            game(1, (1, 2), (PremillDrush, Maa), true),
            game(2, (2, 1), (Maa, PremillDrush), true),
            // Mirror: never scored.
            game(3, (1, 1), (Maa, Maa), true),
        ])
        .expect("insert matches");
}

#[test]
fn rebuild_tallies_each_civ_and_skips_mirrors() {
    let store = store();
    seed_three_games(&store);

    let report = AggregationEngine::new(config())
        .rebuild_civ_outcomes(&store)
        .expect("rebuild");
    assert_eq!(report.scanned, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.keys, 2);

    let mut rows = Vec::new();
    store.for_each_civ_outcome(|row| rows.push(row.clone())).expect("read");
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.outcome.victories, 1, "civ {} victories", row.key.civ);
        assert_eq!(row.outcome.losses, 1, "civ {} losses", row.key.civ);
        assert_eq!(row.key.slice.bucket, 1000);
    }

    let meta = store
        .summary_meta(SummaryTable::CivOutcome)
        .expect("meta")
        .expect("meta written with the table");
    assert_eq!(meta.rule_table_version, config().rules.version);
    assert_eq!(meta.rows, 2);
}

#[test]
fn rebuild_replaces_rather_than_accumulates() {
    let store = store();
    seed_three_games(&store);
    let engine = AggregationEngine::new(config());
    engine.rebuild_civ_outcomes(&store).expect("first rebuild");
    engine.rebuild_civ_outcomes(&store).expect("second rebuild");

    let mut total = 0;
    store
        .for_each_civ_outcome(|row| total += row.outcome.total())
        .expect("read");
    assert_eq!(total, 4);
}

#[test]
fn malformed_rating_is_skipped_not_fatal() {
    let store = store();
    seed_three_games(&store);
    let mut bad = game(4, (1, 2), (Maa, Maa), false);
    bad.rating = RatingValue::Malformed("unknown".into());
    store.insert_match(&bad).expect("insert");

    let report = AggregationEngine::new(config())
        .rebuild_civ_outcomes(&store)
        .expect("rebuild survives bad rows");
    assert_eq!(report.scanned, 4);
    assert_eq!(report.skipped, 1);

    let mut total = 0;
    store
        .for_each_civ_outcome(|row| total += row.outcome.total())
        .expect("read");
    assert_eq!(total, 4, "the malformed match contributes nothing");
}

#[test]
fn win_rate_query_reads_the_summary() {
    let store = store();
    seed_three_games(&store);
    let config = config();
    AggregationEngine::new(config.clone())
        .rebuild_civ_outcomes(&store)
        .expect("rebuild");

    let params = StandardFilterParams::defaults(&config.tuning, store.latest_patch().expect("patch"));
    let eval = StatsEvaluator::new(config)
        .civ_win_rates(&store, &params)
        .expect("evaluate");

    assert_eq!(eval.counters["Britons_total"], 2);
    assert_eq!(eval.counters["Britons_wins"], 1);
    assert_eq!(eval.counters["Britons_losses"], 1);
    assert_eq!(eval.counters["Franks_total"], 2);
    assert_eq!(eval.counters["Goths_total"], 0);
}

#[test]
fn win_rate_query_honours_rating_and_civ_filters() {
    let store = store();
    seed_three_games(&store);
    let config = config();
    AggregationEngine::new(config.clone())
        .rebuild_civ_outcomes(&store)
        .expect("rebuild");
    let evaluator = StatsEvaluator::new(config.clone());

    let above = StandardFilterParams::from_query_str("min_elo=1050", &config.tuning, Some(1)).expect("parse");
    let eval = evaluator.civ_win_rates(&store, &above).expect("evaluate");
    assert_eq!(eval.counters["Britons_total"], 0);

    let only_franks =
        StandardFilterParams::from_query_str("include_civ_ids=2", &config.tuning, Some(1)).expect("parse");
    let eval = evaluator.civ_win_rates(&store, &only_franks).expect("evaluate");
    assert_eq!(eval.counters.get("Franks_total"), Some(&2));
    assert!(!eval.counters.contains_key("Britons_total"));
}
