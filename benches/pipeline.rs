//! Pipeline benchmark: observation → feature vector, and a small training run.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use delay_risk::config::{ParamGrid, TrainingConfig};
use delay_risk::features::{default_feature_columns, CategoricalEncoders, CategoryTable, FeatureEngineer};
use delay_risk::observation::{RawNumber, ShipmentObservation};
use delay_risk::training::{ModelTrainer, SyntheticHistory};

fn engineer() -> FeatureEngineer {
    let encoders = CategoricalEncoders::new()
        .with("weather", CategoryTable::fit(["Clear", "Rain", "Snow", "Fog", "Storm"]))
        .with("traffic_level", CategoryTable::fit(["Light", "Moderate", "Heavy", "Very Heavy"]));
    FeatureEngineer::new(default_feature_columns(), encoders)
}

fn bench_feature_build(c: &mut Criterion) {
    let engineer = engineer();
    let obs = ShipmentObservation {
        shipment_id: "bench".to_string(),
        distance_remaining_km: Some(RawNumber::Number(2800.0)),
        vehicle_speed_kmph: Some(RawNumber::Text("45.5".to_string())),
        weather: Some("Rain".to_string()),
        traffic_level: Some("Heavy".to_string()),
        timestamp: Some("2024-03-05T17:45:00Z".to_string()),
        ..Default::default()
    };

    c.bench_function("feature_build", |b| {
        b.iter(|| engineer.build(black_box(&obs)).unwrap())
    });
}

fn bench_train_small(c: &mut Criterion) {
    let history = SyntheticHistory::new(42, Utc::now()).generate(500);
    let trainer = ModelTrainer::new(TrainingConfig {
        min_samples: 100,
        cv_folds: 3,
        workers: 4,
        grid: ParamGrid {
            n_estimators: vec![20],
            max_depth: vec![8],
            min_samples_split: vec![5],
            min_samples_leaf: vec![2],
        },
        ..TrainingConfig::default()
    });

    let mut g = c.benchmark_group("training");
    g.sample_size(10);
    g.bench_function("train_500_rows", |b| {
        b.iter(|| trainer.fit(black_box(&history)).unwrap().report.test_auc)
    });
    g.finish();
}

criterion_group!(benches, bench_feature_build, bench_train_small);
criterion_main!(benches);
