//! Request parsing and the canonical signature codec.
//!
//! Two shapes arrive from the request layer: standard filters as
//! query-string pairs, and advanced matchup requests as JSON objects.
//! Both are validated strictly. Nothing is coerced.

use crate::{
    config::{SideListPolicy, TuningConfig},
    error::ValidationError,
    opening::OpeningRuleTable,
    types::{PatchNumber, PlayerId, NO_RESTRICTION},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Returns the list if it actually restricts anything.
/// An empty list or one containing the sentinel restricts nothing.
pub fn restriction(list: &[i64]) -> Option<&[i64]> {
    if list.is_empty() || list.contains(&NO_RESTRICTION) {
        None
    } else {
        Some(list)
    }
}

fn unrestricted() -> Vec<i64> {
    vec![NO_RESTRICTION]
}

/// Collapse every list that restricts nothing to `[-1]`, so equivalent
/// requests share a signature.
fn normalized(list: Vec<i64>) -> Vec<i64> {
    if restriction(&list).is_none() {
        unrestricted()
    } else {
        list
    }
}

fn check_rating(field: &str, value: i64, tuning: &TuningConfig) -> Result<(), ValidationError> {
    if value < 0 || value > tuning.rating_ceiling || value % tuning.rating_delta != 0 {
        return Err(ValidationError::out_of_range(field, value));
    }
    Ok(())
}

fn check_bounds(min: i64, max: i64, tuning: &TuningConfig) -> Result<(), ValidationError> {
    check_rating("min_elo", min, tuning)?;
    check_rating("max_elo", max, tuning)?;
    if min > max {
        return Err(ValidationError::out_of_range("min_elo", min));
    }
    Ok(())
}

// ── Text scalars ─────────────────────────────────────────────────────────────

fn parse_int(field: &str, raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::malformed(field))
}

fn parse_int_list(field: &str, raw: &str) -> Result<Vec<i64>, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|part| parse_int(field, part)).collect()
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ValidationError> {
    match raw.trim() {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        _ => Err(ValidationError::malformed(field)),
    }
}

// ── Standard filter ──────────────────────────────────────────────────────────

/// Parameters of a standard (summary-table) statistics request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardFilterParams {
    pub min_elo: i64,
    pub max_elo: i64,
    pub exclude_mirrors: bool,
    pub include_ladder_ids: Vec<i64>,
    pub include_patch_ids: Vec<i64>,
    pub include_map_ids: Vec<i64>,
    pub include_civ_ids: Vec<i64>,
    pub exclude_civ_ids: Vec<i64>,
    pub include_opening_ids: Vec<i64>,
    pub include_tech_ids: Vec<i64>,
    pub include_player_ids: Vec<i64>,
}

impl StandardFilterParams {
    /// Defaults: full rating range, every ladder and map, newest patch.
    pub fn defaults(tuning: &TuningConfig, latest_patch: Option<PatchNumber>) -> Self {
        Self {
            min_elo: 0,
            max_elo: tuning.rating_ceiling,
            exclude_mirrors: false,
            include_ladder_ids: unrestricted(),
            include_patch_ids: latest_patch.map(|p| vec![p]).unwrap_or_else(unrestricted),
            include_map_ids: unrestricted(),
            include_civ_ids: unrestricted(),
            exclude_civ_ids: unrestricted(),
            include_opening_ids: unrestricted(),
            include_tech_ids: unrestricted(),
            include_player_ids: unrestricted(),
        }
    }

    /// Parse `key=value` pairs. Unrecognised keys are ignored.
    pub fn parse<'a, I>(
        pairs: I,
        tuning: &TuningConfig,
        latest_patch: Option<PatchNumber>,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut p = Self::defaults(tuning, latest_patch);
        for (key, raw) in pairs {
            match key {
                "min_elo" => p.min_elo = parse_int(key, raw)?,
                "max_elo" => p.max_elo = parse_int(key, raw)?,
                "exclude_mirrors" => p.exclude_mirrors = parse_bool(key, raw)?,
                "include_ladder_ids" => p.include_ladder_ids = parse_int_list(key, raw)?,
                "include_patch_ids" => p.include_patch_ids = parse_int_list(key, raw)?,
                "include_map_ids" => p.include_map_ids = parse_int_list(key, raw)?,
                "include_civ_ids" => p.include_civ_ids = parse_int_list(key, raw)?,
                "exclude_civ_ids" => p.exclude_civ_ids = parse_int_list(key, raw)?,
                "include_opening_ids" => p.include_opening_ids = parse_int_list(key, raw)?,
                "include_tech_ids" => p.include_tech_ids = parse_int_list(key, raw)?,
                "include_player_ids" => p.include_player_ids = parse_int_list(key, raw)?,
                _ => {}
            }
        }
        check_bounds(p.min_elo, p.max_elo, tuning)?;
        Ok(p)
    }

    /// Parse a raw query string such as `min_elo=1000&include_map_ids=9,29`.
    pub fn from_query_str(
        query: &str,
        tuning: &TuningConfig,
        latest_patch: Option<PatchNumber>,
    ) -> Result<Self, ValidationError> {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| part.split_once('=').unwrap_or((part, "")));
        Self::parse(pairs, tuning, latest_patch)
    }
}

// ── Advanced matchup request ─────────────────────────────────────────────────

/// One side of a matchup slot. Each list holds at most one restricting id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideSelection {
    pub civ_ids: Vec<i64>,
    pub opening_ids: Vec<i64>,
}

impl Default for SideSelection {
    fn default() -> Self {
        Self {
            civ_ids: unrestricted(),
            opening_ids: unrestricted(),
        }
    }
}

impl SideSelection {
    pub fn civ(&self) -> Option<i64> {
        restriction(&self.civ_ids).and_then(|l| l.first().copied())
    }

    pub fn opening(&self) -> Option<i64> {
        restriction(&self.opening_ids).and_then(|l| l.first().copied())
    }

    pub fn is_unconstrained(&self) -> bool {
        self.civ().is_none() && self.opening().is_none()
    }
}

/// Presentation-only lists. Carried into the signature, never compiled.
pub const COMBINATION_KEYS: [&str; 4] = [
    "include_left_civ_combinations",
    "include_left_opening_combinations",
    "include_right_civ_combinations",
    "include_right_opening_combinations",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedRequest {
    pub min_elo: i64,
    pub max_elo: i64,
    /// `0` means no anchor player.
    pub left_player_id: PlayerId,
    pub exclude_civ_mirrors: bool,
    pub exclude_opening_mirrors: bool,
    pub include_ladder_ids: Vec<i64>,
    pub include_patch_ids: Vec<i64>,
    pub include_map_ids: Vec<i64>,
    /// Indexed by slot: `2k` is the left side of pair `k`, `2k + 1` the right.
    pub sides: Vec<SideSelection>,
    pub combinations: BTreeMap<String, Vec<i64>>,
}

fn json_int(obj: &serde_json::Map<String, Json>, key: &str, default: i64) -> Result<i64, ValidationError> {
    match obj.get(key) {
        None => Ok(default),
        Some(v) => v.as_i64().ok_or_else(|| ValidationError::malformed(key)),
    }
}

fn json_bool(obj: &serde_json::Map<String, Json>, key: &str) -> Result<bool, ValidationError> {
    match obj.get(key) {
        None => Ok(false),
        Some(v) => v.as_bool().ok_or_else(|| ValidationError::malformed(key)),
    }
}

fn json_list(obj: &serde_json::Map<String, Json>, key: &str) -> Result<Vec<i64>, ValidationError> {
    match obj.get(key) {
        None => Ok(unrestricted()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|i| i.as_i64().ok_or_else(|| ValidationError::malformed(key)))
            .collect::<Result<Vec<_>, _>>()
            .map(normalized),
        Some(_) => Err(ValidationError::malformed(key)),
    }
}

fn limit_side_list(
    field: &str,
    mut list: Vec<i64>,
    policy: SideListPolicy,
) -> Result<Vec<i64>, ValidationError> {
    if list.len() <= 1 {
        return Ok(list);
    }
    match policy {
        SideListPolicy::Reject => Err(ValidationError::ListLength {
            field: field.to_string(),
            len: list.len(),
            max: 1,
        }),
        SideListPolicy::TruncateToFirst => {
            log::debug!("Truncating {field} from {} values to one", list.len());
            list.truncate(1);
            Ok(list)
        }
    }
}

impl AdvancedRequest {
    pub fn slot_pairs(&self) -> usize {
        self.sides.len() / 2
    }

    /// Parse and validate a JSON request body.
    pub fn from_json(body: &Json, tuning: &TuningConfig) -> Result<Self, ValidationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ValidationError::malformed("request"))?;

        let mut sides = Vec::with_capacity(tuning.advanced_slot_pairs * 2);
        for k in 0..tuning.advanced_slot_pairs * 2 {
            let civ_key = format!("include_civ_ids_{k}");
            let opening_key = format!("include_opening_ids_{k}");
            sides.push(SideSelection {
                civ_ids: limit_side_list(&civ_key, json_list(obj, &civ_key)?, tuning.side_list_policy)?,
                opening_ids: limit_side_list(
                    &opening_key,
                    json_list(obj, &opening_key)?,
                    tuning.side_list_policy,
                )?,
            });
        }

        let mut combinations = BTreeMap::new();
        for key in COMBINATION_KEYS {
            combinations.insert(key.to_string(), json_list(obj, key)?);
        }

        let request = Self {
            min_elo: json_int(obj, "min_elo", tuning.advanced_default_min_rating)?,
            max_elo: json_int(obj, "max_elo", tuning.advanced_default_max_rating)?,
            left_player_id: json_int(obj, "left_player_id", 0)?,
            exclude_civ_mirrors: json_bool(obj, "exclude_civ_mirrors")?,
            exclude_opening_mirrors: json_bool(obj, "exclude_opening_mirrors")?,
            include_ladder_ids: json_list(obj, "include_ladder_ids")?,
            include_patch_ids: json_list(obj, "include_patch_ids")?,
            include_map_ids: json_list(obj, "include_map_ids")?,
            sides,
            combinations,
        };
        check_bounds(request.min_elo, request.max_elo, tuning)?;
        Ok(request)
    }

    /// Every restricting opening id must name a rule in `rules`.
    pub fn check_openings(&self, rules: &OpeningRuleTable) -> Result<(), ValidationError> {
        for (k, side) in self.sides.iter().enumerate() {
            let Some(list) = restriction(&side.opening_ids) else {
                continue;
            };
            let unknown = list
                .iter()
                .find(|id| usize::try_from(**id).map_or(true, |index| index >= rules.len()));
            if let Some(&id) = unknown {
                return Err(ValidationError::out_of_range(format!("include_opening_ids_{k}"), id));
            }
        }
        Ok(())
    }

    /// Deterministic, order-independent serialization used for dedup.
    ///
    /// `key=value&` pairs with keys sorted case-insensitively, list values
    /// sorted ascending and comma-joined, booleans as `True`/`False`.
    /// Slot lists still at their default are left out.
    pub fn to_signature(&self) -> String {
        let bool_text = |b: bool| (if b { "True" } else { "False" }).to_string();
        let list_text = |l: &[i64]| {
            let mut sorted = l.to_vec();
            sorted.sort_unstable();
            sorted
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };

        let mut entries: Vec<(String, String)> = vec![
            ("min_elo".into(), self.min_elo.to_string()),
            ("max_elo".into(), self.max_elo.to_string()),
            ("left_player_id".into(), self.left_player_id.to_string()),
            ("exclude_civ_mirrors".into(), bool_text(self.exclude_civ_mirrors)),
            ("exclude_opening_mirrors".into(), bool_text(self.exclude_opening_mirrors)),
            ("include_ladder_ids".into(), list_text(&self.include_ladder_ids)),
            ("include_patch_ids".into(), list_text(&self.include_patch_ids)),
            ("include_map_ids".into(), list_text(&self.include_map_ids)),
        ];
        let default_side = SideSelection::default();
        for (k, side) in self.sides.iter().enumerate() {
            if side.civ_ids != default_side.civ_ids {
                entries.push((format!("include_civ_ids_{k}"), list_text(&side.civ_ids)));
            }
            if side.opening_ids != default_side.opening_ids {
                entries.push((format!("include_opening_ids_{k}"), list_text(&side.opening_ids)));
            }
        }
        for (key, list) in &self.combinations {
            entries.push((key.clone(), list_text(list)));
        }
        entries.sort_by_key(|(k, _)| k.to_lowercase());

        entries
            .into_iter()
            .map(|(k, v)| format!("{k}={v}&"))
            .collect()
    }

    /// Rebuild a request from a stored signature.
    ///
    /// Multi-valued side lists from older entries are truncated to their
    /// first element whatever the configured policy, so a queued entry can
    /// always be processed.
    pub fn from_signature(signature: &str, tuning: &TuningConfig) -> Result<Self, ValidationError> {
        let mut fields: BTreeMap<&str, &str> = BTreeMap::new();
        for part in signature.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| ValidationError::malformed(part))?;
            fields.insert(key, value);
        }

        let scalar = |key: &str, default: i64| -> Result<i64, ValidationError> {
            fields.get(key).map(|raw| parse_int(key, raw)).unwrap_or(Ok(default))
        };
        let flag = |key: &str| -> Result<bool, ValidationError> {
            fields.get(key).map(|raw| parse_bool(key, raw)).unwrap_or(Ok(false))
        };
        let list = |key: &str| -> Result<Vec<i64>, ValidationError> {
            fields
                .get(key)
                .map(|raw| parse_int_list(key, raw).map(normalized))
                .unwrap_or_else(|| Ok(unrestricted()))
        };

        let mut sides = Vec::with_capacity(tuning.advanced_slot_pairs * 2);
        for k in 0..tuning.advanced_slot_pairs * 2 {
            let civ_key = format!("include_civ_ids_{k}");
            let opening_key = format!("include_opening_ids_{k}");
            sides.push(SideSelection {
                civ_ids: limit_side_list(&civ_key, list(&civ_key)?, SideListPolicy::TruncateToFirst)?,
                opening_ids: limit_side_list(
                    &opening_key,
                    list(&opening_key)?,
                    SideListPolicy::TruncateToFirst,
                )?,
            });
        }
        let mut combinations = BTreeMap::new();
        for key in COMBINATION_KEYS {
            combinations.insert(key.to_string(), list(key)?);
        }

        let request = Self {
            min_elo: scalar("min_elo", tuning.advanced_default_min_rating)?,
            max_elo: scalar("max_elo", tuning.advanced_default_max_rating)?,
            left_player_id: scalar("left_player_id", 0)?,
            exclude_civ_mirrors: flag("exclude_civ_mirrors")?,
            exclude_opening_mirrors: flag("exclude_opening_mirrors")?,
            include_ladder_ids: list("include_ladder_ids")?,
            include_patch_ids: list("include_patch_ids")?,
            include_map_ids: list("include_map_ids")?,
            sides,
            combinations,
        };
        check_bounds(request.min_elo, request.max_elo, tuning)?;
        Ok(request)
    }
}
