//! Offline trainer: labeled history → encoders, scaler, grid-searched forest → artifact.

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::metrics::{mean_std, roc_auc, ClassificationSummary};
use super::split::{stratified_kfold, stratified_split, Split};
use super::synthetic::SyntheticHistory;
use crate::config::{ModelConfig, ParamGrid, TrainingConfig};
use crate::error::{ArtifactError, InputError, TrainingError};
use crate::features::{
    default_feature_columns, CategoricalEncoders, CategoryTable, FeatureEngineer,
    CATEGORICAL_FIELDS,
};
use crate::model::{ForestParams, ModelArtifact, RandomForest, StandardScaler, TrainingSource};
use crate::observation::{read_observations, LabeledObservation, ObservationRecord, ShipmentObservation};
use crate::workers;

/// Decision threshold for the accuracy/precision/recall summary.
const REPORT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub cv_auc_mean: f64,
    pub cv_auc_std: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub version: String,
    pub provenance: TrainingSource,
    pub train_samples: usize,
    pub test_samples: usize,
    pub delay_rate: f64,
    pub best: CandidateScore,
    pub candidates: Vec<CandidateScore>,
    /// `None` when the held-out split lacks one of the classes
    pub test_auc: Option<f64>,
    pub test_summary: ClassificationSummary,
    pub feature_importance: Vec<(String, f64)>,
}

pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn fit(&self, history: &[ShipmentObservation]) -> Result<TrainingOutcome, TrainingError> {
        self.fit_at(history, Utc::now())
    }

    /// `now` stamps the artifact and stands in for missing observation timestamps.
    pub fn fit_at(
        &self,
        history: &[ShipmentObservation],
        now: DateTime<Utc>,
    ) -> Result<TrainingOutcome, TrainingError> {
        let cfg = &self.config;
        let candidates = expand_grid(&cfg.grid, cfg.seed);
        if candidates.is_empty() {
            return Err(TrainingError::EmptyGrid);
        }

        let (labeled, provenance) = self.training_rows(history, now);
        let y: Vec<bool> = labeled.iter().map(|l| l.delayed).collect();
        let positives = y.iter().filter(|&&d| d).count();
        if positives == 0 || positives == y.len() {
            return Err(TrainingError::InsufficientClasses {
                positives,
                total: y.len(),
            });
        }

        let split = stratified_split(&y, cfg.test_fraction, cfg.seed);
        if split.train.len() < cfg.cv_folds.max(2) * 2 {
            return Err(TrainingError::TooFewSamples {
                available: split.train.len(),
                folds: cfg.cv_folds,
            });
        }

        let encoders = fit_encoders(split.train.iter().map(|&i| &labeled[i].observation));
        let engineer = FeatureEngineer::new(default_feature_columns(), encoders);
        let x = build_matrix(&engineer, &labeled, now)?;

        let x_train = x.select(Axis(0), &split.train);
        let x_test = x.select(Axis(0), &split.test);
        let y_train: Vec<bool> = split.train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<bool> = split.test.iter().map(|&i| y[i]).collect();

        let scaler = StandardScaler::fit(x_train.view());
        let xs_train = scaler.transform_matrix(x_train.view());
        let xs_test = scaler.transform_matrix(x_test.view());

        info!(
            samples = labeled.len(),
            train = y_train.len(),
            test = y_test.len(),
            positive_rate = positives as f64 / y.len() as f64,
            candidates = candidates.len(),
            "training started"
        );

        let folds = stratified_kfold(&y_train, cfg.cv_folds, cfg.seed);
        let scored = workers::map_ordered(&candidates, cfg.workers, |_, params| {
            cross_validate(&xs_train, &y_train, &folds, params)
        });
        let scores: Vec<CandidateScore> = candidates
            .iter()
            .zip(scored)
            .filter_map(|(params, score)| {
                let (cv_auc_mean, cv_auc_std) = score.flatten()?;
                debug!(?params, cv_auc_mean, cv_auc_std, "candidate scored");
                Some(CandidateScore {
                    params: *params,
                    cv_auc_mean,
                    cv_auc_std,
                })
            })
            .collect();

        let best = scores
            .iter()
            .fold(None::<&CandidateScore>, |best, c| match best {
                Some(b) if b.cv_auc_mean >= c.cv_auc_mean => Some(b),
                _ => Some(c),
            })
            .cloned()
            .ok_or(TrainingError::NoViableCandidate)?;

        let forest = RandomForest::fit(xs_train.view(), &y_train, &best.params);
        let test_scores = forest.predict_matrix(xs_test.view());
        let test_auc = roc_auc(&y_test, &test_scores);
        let test_summary = ClassificationSummary::at(&y_test, &test_scores, REPORT_THRESHOLD);

        let version = run_version(&cfg.version, now, &provenance);
        let artifact = ModelArtifact::new(
            forest,
            scaler,
            engineer.encoders().clone(),
            engineer.columns().to_vec(),
            version.clone(),
            now,
            provenance.clone(),
        );
        let feature_importance = artifact.feature_importance_ranking();

        info!(
            version = %version,
            cv_auc = best.cv_auc_mean,
            cv_auc_2std = 2.0 * best.cv_auc_std,
            test_auc = ?test_auc,
            accuracy = test_summary.accuracy(),
            precision = test_summary.precision(),
            recall = test_summary.recall(),
            synthetic = provenance.is_synthetic(),
            "training complete"
        );

        Ok(TrainingOutcome {
            artifact,
            report: TrainingReport {
                version,
                provenance,
                train_samples: y_train.len(),
                test_samples: y_test.len(),
                delay_rate: positives as f64 / y.len() as f64,
                best,
                candidates: scores,
                test_auc,
                test_summary,
                feature_importance,
            },
        })
    }

    /// Labeled real history, or synthetic rows when there is too little of it.
    fn training_rows(
        &self,
        history: &[ShipmentObservation],
        now: DateTime<Utc>,
    ) -> (Vec<LabeledObservation>, TrainingSource) {
        let labeled: Vec<LabeledObservation> = history
            .iter()
            .cloned()
            .filter_map(LabeledObservation::from_history)
            .collect();
        if labeled.len() >= self.config.min_samples {
            let samples = labeled.len();
            return (labeled, TrainingSource::Historical { samples });
        }

        warn!(
            labeled = labeled.len(),
            min_samples = self.config.min_samples,
            synthetic_samples = self.config.synthetic_samples,
            "insufficient labeled history, training on synthetic data"
        );
        let synthetic: Vec<LabeledObservation> =
            SyntheticHistory::new(self.config.seed, now)
                .generate(self.config.synthetic_samples)
                .into_iter()
                .filter_map(LabeledObservation::from_history)
                .collect();
        let source = TrainingSource::Synthetic {
            samples: synthetic.len(),
            seed: self.config.seed,
        };
        (synthetic, source)
    }
}

/// Write the artifact to the live path, archiving a versioned copy first when configured.
/// Returns the archive path, if any.
pub fn publish(artifact: &ModelArtifact, config: &ModelConfig) -> Result<Option<PathBuf>, ArtifactError> {
    let archived = match config.archive_dir.as_deref() {
        Some(dir) => Some(artifact.save_versioned(dir)?),
        None => None,
    };
    artifact.save(&config.artifact_path)?;
    Ok(archived)
}

/// Load an observation history file (JSON array). Records that do not decode are skipped.
pub fn read_history(path: &Path) -> Result<Vec<ShipmentObservation>, InputError> {
    let records = read_observations(path)?;
    let total = records.len();
    let history: Vec<ShipmentObservation> = records
        .into_iter()
        .filter_map(|record| match record {
            ObservationRecord::Decoded(obs) => Some(obs),
            ObservationRecord::Malformed { shipment_id, error } => {
                debug!(shipment_id = %shipment_id, error = %error, "history record skipped");
                None
            }
        })
        .collect();
    if history.len() < total {
        warn!(
            path = %path.display(),
            skipped = total - history.len(),
            total,
            "malformed history records skipped"
        );
    }
    Ok(history)
}

fn expand_grid(grid: &ParamGrid, seed: u64) -> Vec<ForestParams> {
    let mut out = Vec::new();
    for &n_estimators in &grid.n_estimators {
        for &max_depth in &grid.max_depth {
            for &min_samples_split in &grid.min_samples_split {
                for &min_samples_leaf in &grid.min_samples_leaf {
                    out.push(ForestParams {
                        n_estimators,
                        max_depth,
                        min_samples_split,
                        min_samples_leaf,
                        max_features: None,
                        seed,
                    });
                }
            }
        }
    }
    out
}

fn fit_encoders<'a>(train: impl Iterator<Item = &'a ShipmentObservation> + Clone) -> CategoricalEncoders {
    let mut encoders = CategoricalEncoders::new();
    for field in CATEGORICAL_FIELDS {
        let table = CategoryTable::fit(train.clone().filter_map(|obs| obs.categorical(field)));
        encoders.insert(field, table);
    }
    encoders
}

fn build_matrix(
    engineer: &FeatureEngineer,
    labeled: &[LabeledObservation],
    now: DateTime<Utc>,
) -> Result<Array2<f64>, TrainingError> {
    let mut x = Array2::zeros((labeled.len(), engineer.columns().len()));
    for (mut row, l) in x.rows_mut().into_iter().zip(labeled) {
        let fv = engineer
            .build_at(&l.observation, now)
            .map_err(|source| TrainingError::Item {
                shipment_id: l.observation.shipment_id.clone(),
                source,
            })?;
        row.assign(&ArrayView1::from(fv.as_slice()));
    }
    Ok(x)
}

/// Mean and population std of fold AUCs; folds missing a class are skipped.
fn cross_validate(
    x: &Array2<f64>,
    y: &[bool],
    folds: &[Split],
    params: &ForestParams,
) -> Option<(f64, f64)> {
    let aucs: Vec<f64> = folds
        .iter()
        .filter_map(|fold| {
            let x_fit = x.select(Axis(0), &fold.train);
            let y_fit: Vec<bool> = fold.train.iter().map(|&i| y[i]).collect();
            let x_val = x.select(Axis(0), &fold.test);
            let y_val: Vec<bool> = fold.test.iter().map(|&i| y[i]).collect();
            let forest = RandomForest::fit(x_fit.view(), &y_fit, params);
            roc_auc(&y_val, &forest.predict_matrix(x_val.view()))
        })
        .collect();
    if aucs.is_empty() {
        return None;
    }
    Some(mean_std(&aucs))
}

/// Base version with per-run build metadata, e.g. `1.0.0+20240601T120000.synthetic`.
fn run_version(base: &str, now: DateTime<Utc>, provenance: &TrainingSource) -> String {
    let stamp = now.format("%Y%m%dT%H%M%S");
    if provenance.is_synthetic() {
        format!("{base}+{stamp}.synthetic")
    } else {
        format!("{base}+{stamp}")
    }
}
