//! Advanced query queue: deduplicated, FIFO, single-flight.
//!
//! State per entry: Pending -> Resolved, with an orthogonal stale flag.
//! A stale entry is kept for history; the next identical request gets a
//! fresh Pending entry.

use crate::{
    error::StatsResult,
    opening::OpeningRuleTable,
    request::AdvancedRequest,
    store::StatsStore,
    types::QueueEntryId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Resolved { result_id: String },
    /// Zero-based rank among live, unresolved entries.
    Pending { position: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOutcome {
    pub entry_id: QueueEntryId,
    pub status: EntryStatus,
}

#[derive(Debug)]
pub struct AdvancedQueryQueue {
    rules: Arc<OpeningRuleTable>,
}

impl AdvancedQueryQueue {
    pub fn new(rules: Arc<OpeningRuleTable>) -> Self {
        Self { rules }
    }

    /// Find or create the live entry for this request's signature and
    /// report its result or its place in line.
    ///
    /// A request naming an opening outside the rule table is rejected
    /// before anything is written.
    pub fn enqueue_or_check(&self, store: &StatsStore, request: &AdvancedRequest) -> StatsResult<EnqueueOutcome> {
        request.check_openings(&self.rules)?;
        let signature = request.to_signature();
        let entry = store.insert_or_get_live_entry(&signature)?;
        store.checkin(entry.id)?;

        let status = match entry.result_id {
            Some(result_id) => EntryStatus::Resolved { result_id },
            None => EntryStatus::Pending {
                position: store.pending_position(entry.id)?,
            },
        };
        log::debug!("Advanced query entry {} is {:?}", entry.id, status);
        Ok(EnqueueOutcome {
            entry_id: entry.id,
            status,
        })
    }
}
