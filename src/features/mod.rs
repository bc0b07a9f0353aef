//! Feature engineering contract shared by training and serving.

mod encoding;
mod engineer;

pub use encoding::{CategoricalEncoders, CategoryTable, FALLBACK_CODE};
pub use engineer::{
    default_feature_columns, FeatureEngineer, BASELINE_LOCATION_RISK, CATEGORICAL_FIELDS,
    DEFAULT_FEATURE_COLUMNS,
};

use serde::{Deserialize, Serialize};

/// Ordered feature values for one observation; `dim` equals the artifact's column count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub dim: usize,
    pub values: Vec<f64>,
    pub shipment_id: String,
    /// Observation time (ms since epoch) the time features were derived from
    pub ts: i64,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.dim.min(self.values.len())]
    }
}
