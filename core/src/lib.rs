//! Opening statistics for 1v1 ranked matches.
//!
//! Matches are classified into openings by an ordered rule table, folded
//! into summary tables by rebuild passes, and queried through a predicate
//! tree that runs against the corpus or the summaries. Expensive ad-hoc
//! queries go through a deduplicated queue drained by workers.

pub mod builder;
pub mod civ_outcome_builder;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod matchup_builder;
pub mod opening;
pub mod predicate;
pub mod query;
pub mod queue;
pub mod record;
pub mod request;
pub mod rng;
pub mod store;
pub mod summary;
pub mod synth;
pub mod tech_stat_builder;
pub mod types;
pub mod worker;
