//! Artifact persistence: round trip, atomic replace, missing and corrupt bundles.

mod common;

use delay_risk::config::{InferenceConfig, RiskConfig};
use delay_risk::error::{ArtifactError, InferenceError};
use delay_risk::inference::InferenceEngine;
use delay_risk::model::{ModelArtifact, ARTIFACT_FORMAT};
use sha2::{Digest, Sha256};
use std::path::Path;

fn write_bundle(path: &Path, payload: &serde_json::Value) {
    let body = serde_json::to_vec(payload).unwrap();
    let header = serde_json::json!({
        "format": ARTIFACT_FORMAT,
        "sha256": format!("{:x}", Sha256::digest(&body)),
    });
    let mut bytes = serde_json::to_vec(&header).unwrap();
    bytes.push(b'\n');
    bytes.extend(body);
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn save_load_preserves_schema_and_domains() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("delay_predictor.json");
    let artifact = common::stub_artifact(0.4);
    artifact.save(&path).unwrap();

    let loaded = ModelArtifact::load(&path).unwrap();
    assert_eq!(loaded.feature_columns(), artifact.feature_columns());
    for field in ["weather", "traffic_level"] {
        let a: Vec<&str> = artifact.feature_encoders().table(field).unwrap().domain().collect();
        let b: Vec<&str> = loaded.feature_encoders().table(field).unwrap().domain().collect();
        assert_eq!(a, b);
    }
    assert_eq!(loaded, artifact);

    // No temp files left beside the artifact.
    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn versioned_copy_is_keyed_by_version_and_time() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = common::stub_artifact(0.4);
    let archived = artifact.save_versioned(dir.path()).unwrap();
    let name = archived.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("delay_predictor-1.0.0+test-"));
    assert!(name.ends_with(".json"));
    assert!(ModelArtifact::load(&archived).is_ok());
}

#[test]
fn missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let err = ModelArtifact::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ArtifactError::Missing { .. }));
}

#[test]
fn garbage_and_tampered_files_are_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.json");

    std::fs::write(&path, b"not an artifact").unwrap();
    assert!(matches!(
        ModelArtifact::load(&path),
        Err(ArtifactError::Corrupt { .. })
    ));

    common::stub_artifact(0.4).save(&path).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 2;
    bytes[last] = if bytes[last] == b'0' { b'1' } else { b'0' };
    std::fs::write(&path, &bytes).unwrap();
    match ModelArtifact::load(&path) {
        Err(ArtifactError::Corrupt { reason, .. }) => assert!(reason.contains("checksum")),
        other => panic!("expected checksum failure, got {other:?}"),
    }
}

#[test]
fn missing_required_field_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.json");
    let mut payload = serde_json::to_value(common::stub_artifact(0.4)).unwrap();
    payload.as_object_mut().unwrap().remove("scaler");
    write_bundle(&path, &payload);

    match ModelArtifact::load(&path) {
        Err(ArtifactError::Corrupt { reason, .. }) => assert!(reason.contains("scaler")),
        other => panic!("expected corrupt, got {other:?}"),
    }
}

#[test]
fn inconsistent_bundle_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.json");
    let mut payload = serde_json::to_value(common::stub_artifact(0.4)).unwrap();
    payload["feature_columns"] = serde_json::json!(["distance_remaining_km"]);
    write_bundle(&path, &payload);
    assert!(matches!(
        ModelArtifact::load(&path),
        Err(ArtifactError::Corrupt { .. })
    ));
}

#[test]
fn failed_reload_keeps_live_model() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    common::stub_artifact(0.8).save(&good).unwrap();
    std::fs::write(&bad, b"{}\n{}").unwrap();

    let engine = InferenceEngine::new(InferenceConfig::default(), RiskConfig::default());
    engine.load(&good).unwrap();
    let err = engine.load(&bad).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::Artifact(ArtifactError::Corrupt { .. })
    ));
    assert!(engine.is_ready());
    let p = engine.predict_one(&common::observation("S1")).unwrap();
    assert_eq!(p.delay_probability, 0.8);
}
