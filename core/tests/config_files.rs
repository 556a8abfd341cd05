//! The shipped data files load, and agree with the built-in defaults.

mod common;

use openings_core::{config::StatsConfig, opening::OpeningRuleTable};
use std::path::Path;

fn data_dir() -> String {
    format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn shipped_rule_table_matches_the_builtin_one() {
    common::init_logging();
    let config = StatsConfig::load(&data_dir()).expect("data files load");
    assert_eq!(*config.rules, OpeningRuleTable::standard());
    assert!(config.tuning.validate().is_ok());
    assert!(!config.civ_names.is_empty());
}

#[test]
fn zero_rating_delta_fails_to_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = data_dir();
    std::fs::create_dir(dir.path().join("openings")).expect("mkdir");
    for file in ["civilizations.json", "openings/rule_table.json"] {
        std::fs::copy(Path::new(&src).join(file), dir.path().join(file)).expect("copy");
    }
    let stats = std::fs::read_to_string(Path::new(&src).join("stats.json")).expect("read");
    let mut tuning: serde_json::Value = serde_json::from_str(&stats).expect("json");
    tuning["rating_delta"] = serde_json::json!(0);
    std::fs::write(dir.path().join("stats.json"), tuning.to_string()).expect("write");

    let dir_str = dir.path().to_str().expect("utf-8 path");
    let err = StatsConfig::load(dir_str).expect_err("zero delta");
    assert!(err.to_string().contains("rating_delta"));
}
