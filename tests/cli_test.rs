//! Binary: config handling and the predict path over a file with a malformed record.

mod common;

use std::path::Path;
use std::process::{Command, Output};

fn delay_risk(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_delay-risk"))
        .env("DELAY_RISK_CONFIG_PATH", config)
        .env("RUST_LOG", "error")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn malformed_config_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"alerts": {"threshold": "#).unwrap();

    let out = delay_risk(&config, &["summary"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Parse"));
}

#[test]
fn unknown_subcommand_and_bad_alert_id_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("absent.json");
    assert!(!delay_risk(&config, &["retrain"]).status.success());
    assert!(!delay_risk(&config, &["resolve", "not-a-uuid"]).status.success());
}

#[test]
fn predict_answers_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("model.json");
    common::stub_artifact(0.9).save(&artifact).unwrap();

    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        serde_json::json!({
            "data_dir": dir.path().join("data"),
            "model": { "artifact_path": artifact },
            "log": { "level": "error" }
        })
        .to_string(),
    )
    .unwrap();

    let input = dir.path().join("observations.json");
    std::fs::write(
        &input,
        r#"[{"shipment_id": "A", "distance_remaining_km": 2800},
            {"shipment_id": "B", "distance_remaining_km": {}},
            {"shipment_id": "C", "weather": 3}]"#,
    )
    .unwrap();

    let out = delay_risk(&config, &["predict", input.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["shipment_id"], "A");
    assert_eq!(lines[1]["features"]["distance_remaining_km"], 1000.0);
    assert_eq!(lines[2]["shipment_id"], "C");
    assert!(lines[2]["error"].is_string());
}
