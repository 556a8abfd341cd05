//! Opening flag vocabulary and the ordered opening rule table.
//!
//! RULE: a rule's position in the table is its identity. Every summary
//! table is keyed by it. Appending is safe only after a full rebuild;
//! reordering or removing entries silently corrupts derived data.
//!
//! The last two rules are reserved: `Straight_FC` (catch-all fast castle)
//! and `Unknown` (never matched, assigned as the fallback label).

use crate::{
    error::{StatsError, StatsResult},
    types::OpeningIndex,
};
use serde::{Deserialize, Serialize};

/// Bits recorded per player per match by the replay analyser.
/// Base variants own one bit; the rest are unions of base bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpeningFlag {
    // ── Base bits ─────────────────────────────────
    /// Never set by the recorder. Used as the "matches nothing" sentinel.
    Unused,
    PremillDrush,
    PostmillDrush,
    Maa,
    FeudalArcherOpening,
    FeudalSkirmOpening,
    FeudalScoutOpening,
    FeudalArcherFollowup,
    FeudalSkirmFollowup,
    FeudalScoutFollowup,
    FastCastle,
    TowerRush,

    // ── Composites ────────────────────────────────
    AnyDrush,
    PremillDrushFC,
    PostmillDrushFC,
    PremillDrushArchers,
    PremillDrushSkirms,
    PostmillDrushArchers,
    PostmillDrushSkirms,
    ScoutsArchers,
    ScoutsSkirms,
    MaaArchers,
    MaaSkirms,
}

impl OpeningFlag {
    pub fn mask(self) -> u32 {
        use OpeningFlag::*;
        match self {
            Unused               => 1 << 0,
            PremillDrush         => 1 << 1,
            PostmillDrush        => 1 << 2,
            Maa                  => 1 << 3,
            FeudalArcherOpening  => 1 << 4,
            FeudalSkirmOpening   => 1 << 5,
            FeudalScoutOpening   => 1 << 6,
            FeudalArcherFollowup => 1 << 7,
            FeudalSkirmFollowup  => 1 << 8,
            FeudalScoutFollowup  => 1 << 9,
            FastCastle           => 1 << 10,
            TowerRush            => 1 << 11,

            AnyDrush             => PremillDrush.mask() | PostmillDrush.mask(),
            PremillDrushFC       => PremillDrush.mask() | FastCastle.mask(),
            PostmillDrushFC      => PostmillDrush.mask() | FastCastle.mask(),
            PremillDrushArchers  => PremillDrush.mask() | FeudalArcherFollowup.mask(),
            PremillDrushSkirms   => PremillDrush.mask() | FeudalSkirmFollowup.mask(),
            PostmillDrushArchers => PostmillDrush.mask() | FeudalArcherFollowup.mask(),
            PostmillDrushSkirms  => PostmillDrush.mask() | FeudalSkirmFollowup.mask(),
            ScoutsArchers        => FeudalScoutOpening.mask() | FeudalArcherFollowup.mask(),
            ScoutsSkirms         => FeudalScoutOpening.mask() | FeudalSkirmFollowup.mask(),
            MaaArchers           => Maa.mask() | FeudalArcherFollowup.mask(),
            MaaSkirms            => Maa.mask() | FeudalSkirmFollowup.mask(),
        }
    }
}

/// Mask of the bit that is never set in recorded flags.
pub const SENTINEL_MASK: u32 = 1;

/// One classification rule: OR over inclusion groups of AND over bits,
/// rejected if any bit of any exclusion group is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningRule {
    pub index: OpeningIndex,
    pub name: String,
    pub inclusion_groups: Vec<u32>,
    pub exclusion_groups: Vec<u32>,
}

impl OpeningRule {
    /// An empty exclusion list is normalized to the sentinel group.
    pub fn new(
        index: OpeningIndex,
        name: impl Into<String>,
        inclusion_groups: Vec<u32>,
        mut exclusion_groups: Vec<u32>,
    ) -> Self {
        if exclusion_groups.is_empty() {
            exclusion_groups.push(SENTINEL_MASK);
        }
        Self {
            index,
            name: name.into(),
            inclusion_groups,
            exclusion_groups,
        }
    }

    /// Union of every exclusion group.
    pub fn exclusion_mask(&self) -> u32 {
        self.exclusion_groups.iter().fold(0, |acc, g| acc | g)
    }
}

// ── On-disk shape ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub include: Vec<OpeningFlag>,
    #[serde(default)]
    pub exclude: Vec<OpeningFlag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTableFile {
    pub version: u32,
    pub basic_count: usize,
    pub rules: Vec<RuleSpec>,
}

// ── Table ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningRuleTable {
    /// Bumped whenever rules change. Recorded beside every summary table.
    pub version: u32,
    /// Rules `[0, basic_count)` are the mutually comparable basic strategies.
    pub basic_count: usize,
    rules: Vec<OpeningRule>,
}

impl OpeningRuleTable {
    pub fn from_file(file: RuleTableFile) -> StatsResult<Self> {
        let rules = file
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                OpeningRule::new(
                    index,
                    spec.name,
                    spec.include.iter().map(|f| f.mask()).collect(),
                    spec.exclude.iter().map(|f| f.mask()).collect(),
                )
            })
            .collect();
        Self::new(file.version, file.basic_count, rules)
    }

    pub fn new(version: u32, basic_count: usize, rules: Vec<OpeningRule>) -> StatsResult<Self> {
        if rules.len() < basic_count + 2 {
            return Err(StatsError::InvalidRuleTable {
                reason: format!(
                    "{} rules cannot hold {basic_count} basic strategies plus the two reserved rules",
                    rules.len()
                ),
            });
        }
        if let Some((pos, rule)) = rules.iter().enumerate().find(|(i, r)| r.index != *i) {
            return Err(StatsError::InvalidRuleTable {
                reason: format!("rule '{}' at position {pos} claims index {}", rule.name, rule.index),
            });
        }
        let unknown = &rules[rules.len() - 1];
        let reachable = unknown
            .inclusion_groups
            .iter()
            .any(|g| g & SENTINEL_MASK == 0);
        if reachable {
            return Err(StatsError::InvalidRuleTable {
                reason: format!("terminal rule '{}' can match recorded flags", unknown.name),
            });
        }
        Ok(Self { version, basic_count, rules })
    }

    /// The built-in table used when no rule file is configured.
    pub fn standard() -> Self {
        use OpeningFlag::*;
        let specs: Vec<(&str, Vec<OpeningFlag>, Vec<OpeningFlag>)> = vec![
            // Basic strategies
            ("Premill_Drush_Any", vec![PremillDrush], vec![]),
            ("Postmill_Drush_Any", vec![PostmillDrush], vec![]),
            ("MAA_Any", vec![Maa], vec![AnyDrush]),
            ("Scouts_Any", vec![FeudalScoutOpening], vec![]),
            ("Range_Opener_Any", vec![FeudalArcherOpening, FeudalSkirmOpening], vec![]),
            // Follow-ups
            ("Premill_Drush_FC", vec![PremillDrushFC], vec![]),
            ("Postmill_Drush_FC", vec![PostmillDrushFC], vec![]),
            (
                "Premill_Drush_Range_Followup",
                vec![PremillDrushArchers, PremillDrushSkirms],
                vec![FeudalScoutFollowup],
            ),
            (
                "Postmill_Drush_Range_Followup",
                vec![PostmillDrushArchers, PostmillDrushSkirms],
                vec![FeudalScoutFollowup],
            ),
            (
                "Scouts_No_Feudal_Followup",
                vec![FeudalScoutOpening],
                vec![FeudalArcherFollowup, FeudalSkirmFollowup],
            ),
            ("Scouts_Range_Followup", vec![ScoutsArchers, ScoutsSkirms], vec![]),
            (
                "MAA_No_Feudal_Followup",
                vec![Maa],
                vec![AnyDrush, FeudalArcherFollowup, FeudalSkirmFollowup, FeudalScoutFollowup],
            ),
            (
                "MAA_Range_Followup",
                vec![MaaSkirms, MaaArchers],
                vec![AnyDrush, FeudalScoutFollowup],
            ),
            // Reserved: keep these last.
            (
                "Straight_FC",
                vec![FastCastle],
                vec![AnyDrush, FeudalScoutOpening, Maa, FeudalArcherOpening, FeudalSkirmOpening],
            ),
            ("Unknown", vec![Unused], vec![Unused]),
        ];
        let file = RuleTableFile {
            version: 1,
            basic_count: 5,
            rules: specs
                .into_iter()
                .map(|(name, include, exclude)| RuleSpec {
                    name: name.to_string(),
                    include,
                    exclude,
                })
                .collect(),
        };
        // The literal table above satisfies every invariant checked in new().
        match Self::from_file(file) {
            Ok(table) => table,
            Err(e) => unreachable!("built-in rule table is invalid: {e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[OpeningRule] {
        &self.rules
    }

    pub fn get(&self, index: OpeningIndex) -> StatsResult<&OpeningRule> {
        self.rules.get(index).ok_or(StatsError::UnknownOpening { index })
    }

    pub fn name(&self, index: OpeningIndex) -> &str {
        self.rules.get(index).map(|r| r.name.as_str()).unwrap_or("Unknown")
    }

    pub fn index_of(&self, name: &str) -> Option<OpeningIndex> {
        self.rules.iter().position(|r| r.name == name)
    }

    /// Index of the fallback label.
    pub fn unknown_index(&self) -> OpeningIndex {
        self.rules.len() - 1
    }

    /// Index of the catch-all fast-castle rule.
    pub fn fast_castle_index(&self) -> OpeningIndex {
        self.rules.len() - 2
    }

    /// Everything except the two reserved trailing rules.
    pub fn evaluable(&self) -> &[OpeningRule] {
        &self.rules[..self.unknown_index()]
    }

    /// True for basic strategies and the two reserved trailing rules.
    /// A partner labelled with anything else is a follow-up of some basic
    /// strategy and would double count.
    pub fn is_basic_or_reserved(&self, index: OpeningIndex) -> bool {
        index < self.basic_count || index >= self.fast_castle_index()
    }
}
