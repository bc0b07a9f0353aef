//! Trainer: synthetic fallback, historical path, publish and serve the trained artifact.

mod common;

use chrono::{TimeZone, Utc};
use delay_risk::config::{InferenceConfig, ModelConfig, ParamGrid, RiskConfig, TrainingConfig};
use delay_risk::error::TrainingError;
use delay_risk::inference::InferenceEngine;
use delay_risk::model::{ModelArtifact, TrainingSource};
use delay_risk::observation::{ShipmentObservation, ShipmentStatus};
use delay_risk::training::{self, ModelTrainer, SyntheticHistory};

fn small_config() -> TrainingConfig {
    TrainingConfig {
        min_samples: 100,
        synthetic_samples: 600,
        seed: 7,
        test_fraction: 0.2,
        cv_folds: 3,
        version: "2.1.0".into(),
        workers: 2,
        grid: ParamGrid {
            n_estimators: vec![15],
            max_depth: vec![4, 6],
            min_samples_split: vec![5],
            min_samples_leaf: vec![2],
        },
    }
}

#[test]
fn falls_back_to_synthetic_and_marks_provenance() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let trainer = ModelTrainer::new(small_config());
    let outcome = trainer.fit_at(&[common::observation("only-one")], now).unwrap();

    let report = &outcome.report;
    assert!(report.provenance.is_synthetic());
    assert_eq!(report.version, "2.1.0+20240601T120000.synthetic");
    assert_eq!(outcome.artifact.version(), report.version);
    assert_eq!(report.candidates.len(), 2);
    assert_eq!(report.train_samples + report.test_samples, 600);
    assert!(report.best.cv_auc_mean > 0.55, "cv auc {}", report.best.cv_auc_mean);
    let test_auc = report.test_auc.unwrap();
    assert!(test_auc > 0.55, "test auc {test_auc}");
    assert_eq!(report.feature_importance.len(), 10);
    let total: f64 = report.feature_importance.iter().map(|(_, v)| v).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(outcome.artifact.validate().is_ok());
}

#[test]
fn uses_history_when_sufficient() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut history = SyntheticHistory::new(11, now).generate(400);
    // Not terminal: dropped by the label filter.
    history.push(ShipmentObservation {
        status: Some(ShipmentStatus::InTransit),
        ..common::observation("in-flight")
    });

    let outcome = ModelTrainer::new(small_config()).fit_at(&history, now).unwrap();
    assert_eq!(
        outcome.report.provenance,
        TrainingSource::Historical { samples: 400 }
    );
    assert_eq!(outcome.report.version, "2.1.0+20240601T120000");
}

#[test]
fn single_class_history_is_rejected() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let history: Vec<ShipmentObservation> = (0..150)
        .map(|i| ShipmentObservation {
            status: Some(ShipmentStatus::Delayed),
            ..common::observation(&format!("D{i}"))
        })
        .collect();
    let err = ModelTrainer::new(small_config())
        .fit_at(&history, now)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        TrainingError::InsufficientClasses { positives: 150, total: 150 }
    ));
}

#[test]
fn empty_grid_is_rejected() {
    let mut config = small_config();
    config.grid.n_estimators.clear();
    assert!(matches!(
        ModelTrainer::new(config).fit(&[]),
        Err(TrainingError::EmptyGrid)
    ));
}

#[test]
fn trained_artifact_round_trips_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let model_config = ModelConfig {
        artifact_path: dir.path().join("live").join("delay_predictor.json"),
        archive_dir: Some(dir.path().join("archive")),
    };

    let outcome = ModelTrainer::new(small_config()).fit(&[]).unwrap();
    let archived = training::publish(&outcome.artifact, &model_config)
        .unwrap()
        .unwrap();
    assert!(archived.exists());

    let loaded = ModelArtifact::load(&model_config.artifact_path).unwrap();
    assert_eq!(loaded.feature_columns(), outcome.artifact.feature_columns());
    assert_eq!(loaded.feature_encoders(), outcome.artifact.feature_encoders());

    let engine = InferenceEngine::new(InferenceConfig { workers: 2 }, RiskConfig::default());
    engine.load(&model_config.artifact_path).unwrap();
    let observations: Vec<ShipmentObservation> = (0..10)
        .map(|i| common::observation(&format!("S{i}")))
        .collect();
    let results = engine.predict_batch(&observations).unwrap();
    assert_eq!(results.len(), 10);
    for r in &results {
        assert!(!r.is_degraded());
        assert!((0.0..=1.0).contains(&r.delay_probability));
        if r.delay_probability <= 0.5 {
            assert_eq!(r.estimated_delay_minutes, 0);
        }
    }
}
