//! Classifier, scaler and the persisted artifact bundling them with the feature schema.

mod artifact;
mod forest;
mod scaler;

pub use artifact::{ModelArtifact, TrainingSource, ARTIFACT_FORMAT, REQUIRED_FIELDS};
pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use scaler::StandardScaler;

/// Probability of the positive ("delayed") class for one scaled feature row.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, features: &[f64]) -> f64;
}
