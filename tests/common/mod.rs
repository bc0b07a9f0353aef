#![allow(dead_code)]

use chrono::Utc;
use delay_risk::features::{default_feature_columns, CategoricalEncoders, CategoryTable};
use delay_risk::model::{DecisionTree, ModelArtifact, RandomForest, StandardScaler, TrainingSource};
use delay_risk::observation::{RawNumber, ShipmentObservation};

pub fn encoders() -> CategoricalEncoders {
    CategoricalEncoders::new()
        .with(
            "weather",
            CategoryTable::fit(["Clear", "Rain", "Snow", "Fog", "Storm"]),
        )
        .with(
            "traffic_level",
            CategoryTable::fit(["Light", "Moderate", "Heavy", "Very Heavy"]),
        )
}

/// Artifact whose classifier always answers `probability`.
pub fn stub_artifact(probability: f64) -> ModelArtifact {
    let columns = default_feature_columns();
    let dim = columns.len();
    ModelArtifact::new(
        RandomForest::from_trees(vec![DecisionTree::constant(probability)], dim),
        StandardScaler::identity(dim),
        encoders(),
        columns,
        "1.0.0+test",
        Utc::now(),
        TrainingSource::Unknown,
    )
}

pub fn observation(id: &str) -> ShipmentObservation {
    ShipmentObservation {
        shipment_id: id.into(),
        origin: "Chicago".into(),
        destination: "Dallas".into(),
        current_location: "Springfield".into(),
        distance_remaining_km: Some(RawNumber::Number(2800.0)),
        vehicle_speed_kmph: Some(RawNumber::Number(45.5)),
        weather: Some("Rain".into()),
        traffic_level: Some("Heavy".into()),
        timestamp: Some("2024-03-05T17:45:00Z".into()),
        ..Default::default()
    }
}
