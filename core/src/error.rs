use crate::types::{MatchId, PlayerId, QueueEntryId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Data quality: {0}")]
    DataQuality(DataQualityIssue),

    #[error("Queue entry {entry_id} was claimed or resolved by another worker")]
    ConcurrencyConflict { entry_id: QueueEntryId },

    #[error("Store unavailable at '{path}': {reason}")]
    StoreUnavailable { path: String, reason: String },

    #[error("Invalid opening rule table: {reason}")]
    InvalidRuleTable { reason: String },

    #[error("Opening index {index} is not in the rule table")]
    UnknownOpening { index: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Request-shape failures. Surfaced to the caller, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{field}' has the wrong type")]
    MalformedType { field: String },

    #[error("field '{field}' value {value} is out of range")]
    OutOfRange { field: String, value: i64 },

    #[error("field '{field}' has {len} values, at most {max} allowed")]
    ListLength { field: String, len: usize, max: usize },
}

impl ValidationError {
    pub fn malformed(field: impl Into<String>) -> Self {
        Self::MalformedType { field: field.into() }
    }

    pub fn out_of_range(field: impl Into<String>, value: i64) -> Self {
        Self::OutOfRange { field: field.into(), value }
    }
}

/// A corpus record that breaks an invariant. Skipped during aggregation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataQualityIssue {
    #[error("match {match_id} has non-numeric rating '{raw}'")]
    MalformedRating { match_id: MatchId, raw: String },

    #[error("action in match {match_id} names player {player_id}, who did not play it")]
    UnknownActor { match_id: MatchId, player_id: PlayerId },
}

impl From<DataQualityIssue> for StatsError {
    fn from(issue: DataQualityIssue) -> Self {
        StatsError::DataQuality(issue)
    }
}
