//! Summary builder trait and pass bookkeeping.
//!
//! RULE: every summary table has exactly one builder.
//! A builder scans the corpus into memory, then replaces its table in a
//! single store call. Nothing is written until the scan has finished.

use crate::{
    error::{DataQualityIssue, StatsResult},
    store::StatsStore,
    summary::{PassReport, SummaryTable},
};

/// The contract every summary builder must fulfill.
pub trait SummaryBuilder {
    /// Stable name used in logs and pass reports.
    fn name(&self) -> &'static str;

    /// The table this builder owns.
    fn table(&self) -> SummaryTable;

    /// Stream the corpus into in-memory tallies.
    /// Data-quality failures go to `progress`, not to the caller.
    fn scan(&mut self, store: &StatsStore, progress: &mut PassProgress) -> StatsResult<()>;

    /// Distinct keys accumulated so far.
    fn key_count(&self) -> usize;

    /// Replace the destination table with the accumulated tallies.
    fn replace(&self, store: &StatsStore, rule_table_version: u32) -> StatsResult<usize>;
}

/// Counts records as a pass streams them and logs at a fixed cadence.
#[derive(Debug)]
pub struct PassProgress {
    builder: &'static str,
    interval: u64,
    scanned: u64,
    skipped: u64,
}

impl PassProgress {
    pub fn new(builder: &'static str, interval: u64) -> Self {
        Self {
            builder,
            interval,
            scanned: 0,
            skipped: 0,
        }
    }

    pub fn record(&mut self) {
        self.scanned += 1;
        if self.interval > 0 && self.scanned % self.interval == 0 {
            log::info!("{}: {} records scanned", self.builder, self.scanned);
        }
    }

    pub fn skip(&mut self, issue: &DataQualityIssue) {
        self.skipped += 1;
        log::debug!("{}: skipped record: {issue}", self.builder);
    }

    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn finish(self, keys: usize) -> PassReport {
        PassReport {
            builder: self.builder.to_string(),
            scanned: self.scanned,
            skipped: self.skipped,
            keys: keys as u64,
        }
    }
}
