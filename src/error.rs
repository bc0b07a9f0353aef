//! Error taxonomy. Structural failures (missing or corrupt artifact, engine not ready) propagate;
//! per-item failures are folded into degraded prediction results by the batch path.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("no model artifact at {path:?}")]
    Missing { path: PathBuf },
    #[error("model artifact at {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("artifact i/o on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("artifact encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ArtifactError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Failure confined to a single observation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("unparseable timestamp {value:?}")]
    InvalidTimestamp { value: String },
    #[error("feature {column} is not finite ({value})")]
    NonFiniteFeature { column: String, value: f64 },
    #[error("feature vector has {actual} values, scaler expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("classifier produced a non-finite probability ({0})")]
    NonFiniteProbability(f64),
    #[error("malformed observation: {0}")]
    Malformed(String),
}

/// Failure to read an observations file as a whole. Bad records inside a readable file are
/// per-item failures instead.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read observations {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("observations {path:?} are not a JSON array: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference engine has no model loaded")]
    EngineNotReady,
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("refusing to install invalid artifact: {0}")]
    InvalidArtifact(String),
    #[error("prediction failed: {0}")]
    Item(#[from] ItemError),
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("training data needs both delayed and on-time examples (positives={positives}, total={total})")]
    InsufficientClasses { positives: usize, total: usize },
    #[error("{available} samples cannot fill {folds} cross-validation folds")]
    TooFewSamples { available: usize, folds: usize },
    #[error("hyperparameter grid is empty")]
    EmptyGrid,
    #[error("no hyperparameter candidate produced a cross-validation score")]
    NoViableCandidate,
    #[error("feature construction failed for {shipment_id}: {source}")]
    Item {
        shipment_id: String,
        source: ItemError,
    },
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("alert storage: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("alert store directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("alert metadata encoding: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("stored alert is malformed: {0}")]
    Decode(String),
    #[error("alert {0} is already resolved")]
    AlreadyResolved(Uuid),
    #[error("alert {0} not found")]
    NotFound(Uuid),
}
