//! Queue worker. One `step()` processes at most one entry.
//!
//! The scheduling loop around `step()` is the caller's concern. A lost
//! claim race or a busy database is reported as idle, not as an error.

use crate::{
    error::{StatsError, StatsResult},
    evaluator::StatsEvaluator,
    request::AdvancedRequest,
    store::{is_busy, ClaimedEntry, StatsStore},
    types::QueueEntryId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Idle,
    Resolved {
        entry_id: QueueEntryId,
        result_id: String,
    },
    /// The entry could not be decoded or compiled and was marked stale.
    Retired {
        entry_id: QueueEntryId,
        reason: String,
    },
}

pub struct QueueWorker {
    evaluator: StatsEvaluator,
    /// Prefix of every claim token this worker issues.
    name: String,
}

impl QueueWorker {
    pub fn new(evaluator: StatsEvaluator, name: impl Into<String>) -> Self {
        Self {
            evaluator,
            name: name.into(),
        }
    }

    pub fn step(&self, store: &StatsStore) -> StatsResult<StepOutcome> {
        let token = format!("{}:{}", self.name, uuid::Uuid::new_v4());
        let claimed = match store.claim_next_entry(&token) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(StepOutcome::Idle),
            Err(e) if is_busy(&e) => {
                log::debug!("{}: store busy while claiming, idling", self.name);
                return Ok(StepOutcome::Idle);
            }
            Err(e) => return Err(e),
        };
        log::info!("{}: claimed advanced query entry {}", self.name, claimed.id);

        match self.process(store, &claimed) {
            Ok(result_id) => {
                log::info!(
                    "{}: resolved entry {} with result {result_id}",
                    self.name,
                    claimed.id
                );
                Ok(StepOutcome::Resolved {
                    entry_id: claimed.id,
                    result_id,
                })
            }
            Err(StatsError::ConcurrencyConflict { entry_id }) => {
                log::debug!("{}: entry {entry_id} taken by another worker", self.name);
                Ok(StepOutcome::Idle)
            }
            Err(e @ StatsError::Validation(_)) => {
                // An unreadable signature would block the queue forever.
                log::warn!("{}: retiring entry {}: {e}", self.name, claimed.id);
                store.mark_stale(claimed.id)?;
                Ok(StepOutcome::Retired {
                    entry_id: claimed.id,
                    reason: e.to_string(),
                })
            }
            Err(e) if is_busy(&e) => {
                store.release_claim(claimed.id, &claimed.claim_token)?;
                Ok(StepOutcome::Idle)
            }
            Err(e) => {
                store.release_claim(claimed.id, &claimed.claim_token)?;
                Err(e)
            }
        }
    }

    fn process(&self, store: &StatsStore, claimed: &ClaimedEntry) -> StatsResult<String> {
        let tuning = &self.evaluator.compiler().config().tuning;
        let request = AdvancedRequest::from_signature(&claimed.query, tuning)?;
        let evaluation = self.evaluator.run_advanced(store, &request)?;
        log::debug!(
            "{}: entry {} evaluated over {} matches ({} skipped)",
            self.name,
            claimed.id,
            evaluation.rows,
            evaluation.skipped
        );
        let data = serde_json::to_string(&evaluation.counters)?;
        store.resolve_entry(claimed.id, &claimed.claim_token, &data)
    }
}
