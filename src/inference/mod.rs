//! Serving path: observation → features → scaled row → probability → risk tier and delay estimate.

mod engine;

pub use engine::{InferenceEngine, LoadedModel};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::risk::RiskLevel;

/// Probability reported for an item that could not be scored.
pub const DEGRADED_PROBABILITY: f64 = 0.5;
/// Delay estimate reported for an item that could not be scored.
pub const DEGRADED_DELAY_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub shipment_id: String,
    pub delay_probability: f64,
    pub risk_level: RiskLevel,
    pub estimated_delay_minutes: u32,
    pub prediction_timestamp: DateTime<Utc>,
    pub model_version: String,
    /// Unscaled feature values keyed by column
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    /// Set only on degraded results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    /// Neutral stand-in for an item whose prediction failed.
    pub fn degraded(shipment_id: &str, model_version: &str, error: impl Into<String>) -> Self {
        Self {
            shipment_id: shipment_id.to_string(),
            delay_probability: DEGRADED_PROBABILITY,
            risk_level: RiskLevel::Medium,
            estimated_delay_minutes: DEGRADED_DELAY_MINUTES,
            prediction_timestamp: Utc::now(),
            model_version: model_version.to_string(),
            features: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
