use crate::{
    error::StatsResult,
    opening::{OpeningRuleTable, RuleTableFile},
    types::CivId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What the compiler does with a matchup side that names more than one
/// civilization or opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideListPolicy {
    /// Fail with a list-length validation error.
    Reject,
    /// Keep only the first element. Matches requests queued by older clients.
    TruncateToFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    pub rating_delta: i64,
    pub rating_ceiling: i64,
    pub advanced_slot_pairs: usize,
    pub advanced_default_min_rating: i64,
    pub advanced_default_max_rating: i64,
    pub progress_interval: u64,
    pub tech_researched_event_type: i64,
    pub side_list_policy: SideListPolicy,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            rating_delta: 50,
            rating_ceiling: 9000,
            advanced_slot_pairs: 50,
            advanced_default_min_rating: 0,
            advanced_default_max_rating: 3000,
            progress_interval: 5000,
            tech_researched_event_type: 3,
            side_list_policy: SideListPolicy::Reject,
        }
    }
}

impl TuningConfig {
    /// Reject knobs that would divide by zero or leave no matchup slots.
    pub fn validate(&self) -> StatsResult<()> {
        if self.rating_delta <= 0 {
            return Err(anyhow::anyhow!("rating_delta must be positive, got {}", self.rating_delta).into());
        }
        if self.rating_ceiling < 0 {
            return Err(anyhow::anyhow!("rating_ceiling must not be negative, got {}", self.rating_ceiling).into());
        }
        if self.advanced_slot_pairs == 0 {
            return Err(anyhow::anyhow!("advanced_slot_pairs must be at least 1").into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CivilizationEntry {
    pub id: CivId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CivilizationsFile {
    civilizations: Vec<CivilizationEntry>,
}

/// Process-wide immutable configuration. Loaded once at startup and
/// handed to every component constructor.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub tuning: TuningConfig,
    pub rules: Arc<OpeningRuleTable>,
    pub civ_names: Arc<BTreeMap<CivId, String>>,
}

impl StatsConfig {
    /// Load all configuration from JSON files under `data_dir`.
    pub fn load(data_dir: &str) -> StatsResult<Self> {
        let tuning_path = format!("{data_dir}/stats.json");
        let tuning_content = std::fs::read_to_string(&tuning_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tuning_path}: {e}"))?;
        let tuning: TuningConfig = serde_json::from_str(&tuning_content)?;
        tuning.validate()?;

        let rules_path = format!("{data_dir}/openings/rule_table.json");
        let rules_content = std::fs::read_to_string(&rules_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {rules_path}: {e}"))?;
        let rules_file: RuleTableFile = serde_json::from_str(&rules_content)?;
        let rules = OpeningRuleTable::from_file(rules_file)?;

        let civs_path = format!("{data_dir}/civilizations.json");
        let civs_content = std::fs::read_to_string(&civs_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {civs_path}: {e}"))?;
        let civs_file: CivilizationsFile = serde_json::from_str(&civs_content)?;

        log::info!(
            "Loaded rule table v{} ({} rules, {} basic) and {} civilizations",
            rules.version,
            rules.len(),
            rules.basic_count,
            civs_file.civilizations.len()
        );

        Ok(Self {
            tuning,
            rules: Arc::new(rules),
            civ_names: Arc::new(
                civs_file
                    .civilizations
                    .into_iter()
                    .map(|c| (c.id, c.name))
                    .collect(),
            ),
        })
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        let civs = [
            (1, "Britons"),
            (2, "Franks"),
            (3, "Goths"),
            (4, "Teutons"),
            (5, "Japanese"),
            (6, "Chinese"),
            (7, "Byzantines"),
            (8, "Persians"),
        ];
        Self {
            tuning: TuningConfig::default(),
            rules: Arc::new(OpeningRuleTable::standard()),
            civ_names: Arc::new(civs.iter().map(|(id, n)| (*id, n.to_string())).collect()),
        }
    }

    pub fn civ_name(&self, civ: CivId) -> String {
        self.civ_names
            .get(&civ)
            .cloned()
            .unwrap_or_else(|| format!("Civ{civ}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_valid() {
        assert!(TuningConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_divisors_are_rejected() {
        let zero_delta = TuningConfig {
            rating_delta: 0,
            ..TuningConfig::default()
        };
        let err = zero_delta.validate().expect_err("zero delta");
        assert!(err.to_string().contains("rating_delta"));

        let no_slots = TuningConfig {
            advanced_slot_pairs: 0,
            ..TuningConfig::default()
        };
        let err = no_slots.validate().expect_err("no slots");
        assert!(err.to_string().contains("advanced_slot_pairs"));
    }
}
