//! Several connections racing on one database file.

mod common;

use common::{config, game, init_logging};
use openings_core::{
    evaluator::StatsEvaluator,
    opening::OpeningFlag::*,
    queue::AdvancedQueryQueue,
    request::AdvancedRequest,
    store::StatsStore,
    worker::{QueueWorker, StepOutcome},
};
use serde_json::json;
use std::{sync::Barrier, thread};

const THREADS: usize = 4;

fn request() -> AdvancedRequest {
    AdvancedRequest::from_json(&json!({ "include_opening_ids_0": [0] }), &config().tuning).expect("valid")
}

fn shared_db() -> (tempfile::TempDir, String) {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stats.db").to_string_lossy().into_owned();
    let store = StatsStore::open(&path).expect("open");
    store.migrate().expect("migrate");
    store
        .insert_matches(&[
            game(1, (1, 2), (PremillDrush, Maa), true),
            game(2, (1, 2), (Maa, PremillDrush), false),
        ])
        .expect("matches");
    (dir, path)
}

#[test]
fn concurrent_enqueues_converge_on_one_entry() {
    let (_dir, path) = shared_db();
    let barrier = Barrier::new(THREADS);

    let ids: Vec<i64> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    let store = StatsStore::open(&path).expect("open");
                    barrier.wait();
                    AdvancedQueryQueue::new(config().rules)
                        .enqueue_or_check(&store, &request())
                        .expect("enqueue")
                        .entry_id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("thread")).collect()
    });

    assert!(ids.windows(2).all(|w| w[0] == w[1]), "ids differ: {ids:?}");
}

#[test]
fn an_entry_is_resolved_exactly_once() {
    let (_dir, path) = shared_db();
    {
        let store = StatsStore::open(&path).expect("open");
        AdvancedQueryQueue::new(config().rules)
            .enqueue_or_check(&store, &request())
            .expect("enqueue");
    }
    let barrier = Barrier::new(THREADS);

    let resolved: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let (path, barrier) = (&path, &barrier);
                s.spawn(move || {
                    let store = StatsStore::open(path).expect("open");
                    let worker = QueueWorker::new(StatsEvaluator::new(config()), format!("w{i}"));
                    barrier.wait();
                    let mut count = 0;
                    while let StepOutcome::Resolved { .. } = worker.step(&store).expect("step") {
                        count += 1;
                    }
                    count
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("thread")).sum()
    });

    assert_eq!(resolved, 1);
    let store = StatsStore::open(&path).expect("open");
    let outcome = AdvancedQueryQueue::new(config().rules)
        .enqueue_or_check(&store, &request())
        .expect("check");
    assert!(matches!(
        outcome.status,
        openings_core::queue::EntryStatus::Resolved { .. }
    ));
}
