//! Offline model training: labeling, stratified splits, grid search with cross-validated AUC,
//! synthetic fallback data and artifact publication.

mod metrics;
mod split;
mod synthetic;
mod trainer;

pub use metrics::{mean_std, roc_auc, ClassificationSummary};
pub use split::{stratified_kfold, stratified_split, Split};
pub use synthetic::{SyntheticHistory, CITIES, TRAFFIC, WEATHER};
pub use trainer::{
    publish, read_history, CandidateScore, ModelTrainer, TrainingOutcome, TrainingReport,
};
