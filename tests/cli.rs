//! The `agreement` binary driven as a subprocess

mod common;

use common::pos_config_json;
use std::process::Command;

fn agreement() -> Command {
    Command::new(env!("CARGO_BIN_EXE_agreement"))
}

#[test]
fn test_invalid_config_leaves_database_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("agreement.db");
    let config = dir.path().join("broken.json");
    let json = pos_config_json("broken").replace("\"fuzzDistance\": 0,", "");
    std::fs::write(&config, json).unwrap();

    let output = agreement()
        .arg("run")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fuzzDistance"), "{}", stderr);
    assert!(!db.exists());
}

#[test]
fn test_valid_config_runs_against_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("agreement.db");
    let config = dir.path().join("analysis.json");
    std::fs::write(&config, pos_config_json("empty")).unwrap();

    let output = agreement()
        .arg("run")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("--analysis-id")
        .arg("run-1")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["analysisId"], "run-1");
    assert_eq!(summary["documents"], 0);
    assert!(db.exists());
}
