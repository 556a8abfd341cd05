//! stats-runner: headless driver for the opening statistics pipeline.
//!
//! Usage:
//!   stats-runner seed    --db stats.db --seed 42 --matches 5000
//!   stats-runner rebuild --db stats.db --table all
//!   stats-runner enqueue --db stats.db --request '{"include_opening_ids_0":[2]}'
//!   stats-runner work    --db stats.db --max-steps 10
//!   stats-runner query   --db stats.db --table civ --filter 'min_elo=1000'
//!   stats-runner result  --db stats.db --id <result-id>

use anyhow::{bail, Context, Result};
use openings_core::{
    config::StatsConfig,
    engine::AggregationEngine,
    evaluator::{Evaluation, StatsEvaluator},
    queue::AdvancedQueryQueue,
    request::{AdvancedRequest, StandardFilterParams},
    store::StatsStore,
    summary::PassReport,
    synth::{CorpusGenerator, CorpusSettings},
    worker::{QueueWorker, StepOutcome},
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let db = str_arg(&args, "--db", "stats.db");
    let data_dir = str_arg(&args, "--data-dir", "./data");

    let config = StatsConfig::load(data_dir).with_context(|| format!("loading config from {data_dir}"))?;
    let store = StatsStore::open(db)?;
    store.migrate()?;
    log::info!("stats-runner {command} against {db}");

    match command {
        "seed" => seed(&args, &store, &config),
        "rebuild" => rebuild(&args, &store, config),
        "enqueue" => enqueue(&args, &store, &config),
        "work" => work(&args, &store, config),
        "query" => query(&args, &store, config),
        "result" => result(&args, &store),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!("Commands: seed, rebuild, enqueue, work, query, result");
            Ok(())
        }
    }
}

fn seed(args: &[String], store: &StatsStore, config: &StatsConfig) -> Result<()> {
    let seed = parse_arg(args, "--seed", 42u64);
    let matches = parse_arg(args, "--matches", 1_000usize);
    let settings = CorpusSettings {
        matches,
        tech_event_type: config.tuning.tech_researched_event_type,
        ..CorpusSettings::default()
    };
    let civs = config.civ_names.keys().copied().collect();
    let corpus = CorpusGenerator::new(seed, civs, settings).generate();
    corpus.write_to(store)?;

    println!("=== SEED ===");
    println!("  seed:     {seed}");
    println!("  matches:  {}", store.match_count()?);
    println!("  actions:  {}", store.action_count()?);
    Ok(())
}

fn rebuild(args: &[String], store: &StatsStore, config: StatsConfig) -> Result<()> {
    let engine = AggregationEngine::new(config);
    let reports = match str_arg(args, "--table", "all") {
        "civ" => vec![engine.rebuild_civ_outcomes(store)?],
        "matchup" => vec![engine.rebuild_opening_matchup_outcomes(store)?],
        "tech" => vec![engine.rebuild_opening_tech_stats(store)?],
        "all" => engine.rebuild_all(store)?,
        other => bail!("unknown table {other}; expected civ, matchup, tech or all"),
    };
    print_reports(&reports);
    Ok(())
}

fn enqueue(args: &[String], store: &StatsStore, config: &StatsConfig) -> Result<()> {
    let body: serde_json::Value = serde_json::from_str(str_arg(args, "--request", "{}"))?;
    let request = AdvancedRequest::from_json(&body, &config.tuning)?;
    let outcome = AdvancedQueryQueue::new(config.rules.clone()).enqueue_or_check(store, &request)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn work(args: &[String], store: &StatsStore, config: StatsConfig) -> Result<()> {
    let max_steps = parse_arg(args, "--max-steps", 10u64);
    let worker = QueueWorker::new(StatsEvaluator::new(config), "stats-runner");
    let mut resolved = 0u64;
    for _ in 0..max_steps {
        match worker.step(store)? {
            StepOutcome::Idle => break,
            StepOutcome::Resolved { entry_id, result_id } => {
                println!("  entry {entry_id} -> {result_id}");
                resolved += 1;
            }
            StepOutcome::Retired { entry_id, reason } => {
                eprintln!("  entry {entry_id} retired: {reason}");
            }
        }
    }
    println!("Resolved {resolved} entries");
    Ok(())
}

fn query(args: &[String], store: &StatsStore, config: StatsConfig) -> Result<()> {
    let tuning = config.tuning.clone();
    let evaluator = StatsEvaluator::new(config);
    let params =
        StandardFilterParams::from_query_str(str_arg(args, "--filter", ""), &tuning, store.latest_patch()?)?;

    match str_arg(args, "--table", "civ") {
        "civ" => print_evaluation(&evaluator.civ_win_rates(store, &params)?),
        "basic" => print_evaluation(&evaluator.basic_strategies(store, &params)?),
        "matchup" => print_evaluation(&evaluator.opening_matchups(store, &params)?),
        "players" => print_evaluation(&evaluator.player_records(store, &params)?),
        "tech" => {
            for t in evaluator.tech_timings(store, &params)? {
                println!(
                    "  {:<32} tech {:>4} | n={:>6} | mean {:>9.0} ms",
                    t.opening_name, t.tech, t.research_count, t.mean_time_ms
                );
            }
        }
        other => bail!("unknown table {other}; expected civ, basic, matchup, players or tech"),
    }
    Ok(())
}

fn result(args: &[String], store: &StatsStore) -> Result<()> {
    let id = str_arg(args, "--id", "");
    match store.query_result(id)? {
        Some(record) => println!("{}", record.data),
        None => bail!("no result with id {id:?}"),
    }
    Ok(())
}

fn print_reports(reports: &[PassReport]) {
    println!("=== REBUILD ===");
    for r in reports {
        println!(
            "  {:<28} scanned {:>8} | skipped {:>5} | keys {:>6}",
            r.builder, r.scanned, r.skipped, r.keys
        );
    }
}

fn print_evaluation(evaluation: &Evaluation) {
    println!("=== {} rows ({} skipped) ===", evaluation.rows, evaluation.skipped);
    for (name, value) in &evaluation.counters {
        if *value != 0 {
            println!("  {name:<48} {value}");
        }
    }
}

fn str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
