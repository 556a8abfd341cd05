//! The aggregation engine. Runs summary builders against the store.
//!
//! PASS ORDER for `rebuild_all` (fixed, documented):
//!   1. Civilization outcomes
//!   2. Opening matchup outcomes
//!   3. Opening tech research
//!
//! RULES:
//!   - A pass is all-or-nothing: scan fully, then replace in one transaction.
//!   - Two rebuilds of the same table must not run concurrently. Callers
//!     serialize them; different tables are independent.
//!   - Data-quality failures are counted in the pass report, never fatal.

use crate::{
    builder::{PassProgress, SummaryBuilder},
    civ_outcome_builder::CivOutcomeBuilder,
    config::StatsConfig,
    error::StatsResult,
    matchup_builder::MatchupBuilder,
    store::StatsStore,
    summary::PassReport,
    tech_stat_builder::TechStatBuilder,
};

pub struct AggregationEngine {
    config: StatsConfig,
}

impl AggregationEngine {
    pub fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Scan with `builder` and replace its table. On any error before the
    /// replace commits, the previous table contents are left untouched.
    pub fn run(&self, builder: &mut dyn SummaryBuilder, store: &StatsStore) -> StatsResult<PassReport> {
        let version = self.config.rules.version;
        if let Some(meta) = store.summary_meta(builder.table())? {
            if meta.rule_table_version != version {
                log::warn!(
                    "{} was built with rule table v{}, rebuilding with v{}",
                    builder.name(),
                    meta.rule_table_version,
                    version
                );
            }
        }

        log::info!("{}: rebuild started", builder.name());
        let mut progress = PassProgress::new(builder.name(), self.config.tuning.progress_interval);
        builder.scan(store, &mut progress)?;
        let written = builder.replace(store, version)?;
        let report = progress.finish(builder.key_count());
        log::info!(
            "{}: rebuild finished, {} scanned, {} skipped, {} rows written",
            report.builder,
            report.scanned,
            report.skipped,
            written
        );
        Ok(report)
    }

    pub fn rebuild_civ_outcomes(&self, store: &StatsStore) -> StatsResult<PassReport> {
        self.run(&mut CivOutcomeBuilder::new(&self.config), store)
    }

    pub fn rebuild_opening_matchup_outcomes(&self, store: &StatsStore) -> StatsResult<PassReport> {
        self.run(&mut MatchupBuilder::new(&self.config), store)
    }

    pub fn rebuild_opening_tech_stats(&self, store: &StatsStore) -> StatsResult<PassReport> {
        self.run(&mut TechStatBuilder::new(&self.config), store)
    }

    /// Every pass, in the documented order.
    pub fn rebuild_all(&self, store: &StatsStore) -> StatsResult<Vec<PassReport>> {
        Ok(vec![
            self.rebuild_civ_outcomes(store)?,
            self.rebuild_opening_matchup_outcomes(store)?,
            self.rebuild_opening_tech_stats(store)?,
        ])
    }
}
