//! Evaluates compiled queries against the corpus or the summary tables.

use crate::{
    config::StatsConfig,
    error::StatsResult,
    predicate::{CounterSet, Tallies},
    query::{CompiledQuery, QueryCompiler},
    request::{AdvancedRequest, StandardFilterParams},
    store::StatsStore,
    summary::{RunningMean, SummaryTable},
    types::{OpeningIndex, TechId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters plus how many rows fed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub counters: CounterSet,
    pub rows: u64,
    /// Rows dropped for data-quality reasons.
    pub skipped: u64,
}

/// Mean research time of one tech under one opening, merged across slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechTiming {
    pub opening: OpeningIndex,
    pub opening_name: String,
    pub tech: TechId,
    pub research_count: i64,
    pub mean_time_ms: f64,
}

pub struct StatsEvaluator {
    compiler: QueryCompiler,
}

impl StatsEvaluator {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            compiler: QueryCompiler::new(config),
        }
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    // ── Corpus path ────────────────────────────────────────────────

    /// Stream matches accepted by the (pushed-down) filter and sum counters.
    /// Matches with a malformed rating never contribute.
    pub fn evaluate_on_matches(&self, store: &StatsStore, query: &CompiledQuery) -> StatsResult<Evaluation> {
        let mut tallies = Tallies::new(&query.aggregates);
        let mut skipped = 0u64;
        store.stream_matches(&query.filter, |m| {
            match m.rating.numeric(m.id) {
                Ok(_) => tallies.observe(&m),
                Err(issue) => {
                    skipped += 1;
                    log::debug!("Skipping match during evaluation: {issue}");
                }
            }
            Ok(())
        })?;
        let rows = tallies.rows_seen();
        Ok(Evaluation {
            counters: tallies.finish(),
            rows,
            skipped,
        })
    }

    pub fn run_advanced(&self, store: &StatsStore, request: &AdvancedRequest) -> StatsResult<Evaluation> {
        let query = self.compiler.compile_advanced_request(request)?;
        self.evaluate_on_matches(store, &query)
    }

    pub fn player_records(&self, store: &StatsStore, params: &StandardFilterParams) -> StatsResult<Evaluation> {
        let query = self.compiler.compile_player_record(params);
        self.evaluate_on_matches(store, &query)
    }

    // ── Summary path ───────────────────────────────────────────────

    fn warn_if_outdated(&self, store: &StatsStore, table: SummaryTable) -> StatsResult<()> {
        let version = self.compiler.config().rules.version;
        match store.summary_meta(table)? {
            Some(meta) if meta.rule_table_version != version => log::warn!(
                "{} was built with rule table v{}, current is v{}",
                table.name(),
                meta.rule_table_version,
                version
            ),
            None => log::warn!("{} has never been built", table.name()),
            _ => {}
        }
        Ok(())
    }

    pub fn civ_win_rates(&self, store: &StatsStore, params: &StandardFilterParams) -> StatsResult<Evaluation> {
        self.warn_if_outdated(store, SummaryTable::CivOutcome)?;
        let query = self.compiler.compile_civ_win_rates(params);
        let mut tallies = Tallies::new(&query.aggregates);
        store.for_each_civ_outcome(|row| {
            if query.filter.evaluate(row) {
                tallies.observe(row);
            }
        })?;
        let rows = tallies.rows_seen();
        Ok(Evaluation {
            counters: tallies.finish(),
            rows,
            skipped: 0,
        })
    }

    fn over_matchups(&self, store: &StatsStore, query: &CompiledQuery) -> StatsResult<Evaluation> {
        self.warn_if_outdated(store, SummaryTable::OpeningMatchupOutcome)?;
        let mut tallies = Tallies::new(&query.aggregates);
        store.for_each_matchup(|row| {
            if query.filter.evaluate(row) {
                tallies.observe(row);
            }
        })?;
        let rows = tallies.rows_seen();
        Ok(Evaluation {
            counters: tallies.finish(),
            rows,
            skipped: 0,
        })
    }

    pub fn basic_strategies(&self, store: &StatsStore, params: &StandardFilterParams) -> StatsResult<Evaluation> {
        let query = self.compiler.compile_basic_strategies(params)?;
        self.over_matchups(store, &query)
    }

    pub fn opening_matchups(&self, store: &StatsStore, params: &StandardFilterParams) -> StatsResult<Evaluation> {
        let query = self.compiler.compile_opening_matchups(params)?;
        self.over_matchups(store, &query)
    }

    /// Count-weighted mean research time per (opening, tech).
    pub fn tech_timings(&self, store: &StatsStore, params: &StandardFilterParams) -> StatsResult<Vec<TechTiming>> {
        self.warn_if_outdated(store, SummaryTable::OpeningTechStat)?;
        let filter = self.compiler.compile_tech_filter(params)?;
        let mut merged: BTreeMap<(OpeningIndex, TechId), RunningMean> = BTreeMap::new();
        store.for_each_tech_stat(|row| {
            if filter.evaluate(row) {
                merged
                    .entry((row.key.opening, row.key.tech))
                    .or_default()
                    .merge(&row.stat);
            }
        })?;
        let rules = &self.compiler.config().rules;
        Ok(merged
            .into_iter()
            .map(|((opening, tech), stat)| TechTiming {
                opening,
                opening_name: rules.name(opening).to_string(),
                tech,
                research_count: stat.count,
                mean_time_ms: stat.mean,
            })
            .collect())
    }
}
