//! Inference engine: holds the live artifact and answers single and batch predictions.
//!
//! The live artifact sits behind an `RwLock<Option<Arc<_>>>`. A load validates the complete
//! bundle before the pointer swap, and each prediction call works from one `Arc` snapshot, so a
//! reader never sees a half-initialized model and a concurrent reload never changes the model
//! mid-batch.

use chrono::Utc;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::PredictionResult;
use crate::config::{InferenceConfig, RiskConfig};
use crate::error::{InferenceError, ItemError};
use crate::features::FeatureEngineer;
use crate::model::{Classifier, ModelArtifact};
use crate::observation::{ObservationRecord, ShipmentObservation};
use crate::risk::RiskEngine;
use crate::workers;

/// Artifact plus the engineer bound to its schema, built once per load.
pub struct LoadedModel {
    artifact: ModelArtifact,
    engineer: FeatureEngineer,
}

impl LoadedModel {
    fn new(artifact: ModelArtifact) -> Self {
        let engineer = artifact.feature_engineer();
        Self { artifact, engineer }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        self.artifact.version()
    }

    fn predict(
        &self,
        obs: &ShipmentObservation,
        risk: &RiskEngine,
    ) -> Result<PredictionResult, ItemError> {
        let fv = self.engineer.build(obs)?;
        let scaled = self.artifact.scaler().transform(fv.as_slice())?;
        let probability = self.artifact.model().predict_proba(&scaled);
        if !probability.is_finite() {
            return Err(ItemError::NonFiniteProbability(probability));
        }
        let probability = probability.clamp(0.0, 1.0);
        let assessment = risk.assess(probability, obs.distance_km().value());

        Ok(PredictionResult {
            shipment_id: obs.shipment_id.clone(),
            delay_probability: probability,
            risk_level: assessment.level,
            estimated_delay_minutes: assessment.estimated_delay_minutes,
            prediction_timestamp: Utc::now(),
            model_version: self.version().to_string(),
            features: self.engineer.snapshot(&fv),
            error: None,
        })
    }
}

pub struct InferenceEngine {
    live: RwLock<Option<Arc<LoadedModel>>>,
    config: InferenceConfig,
    risk: RiskEngine,
}

impl InferenceEngine {
    pub fn new(config: InferenceConfig, risk: RiskConfig) -> Self {
        Self {
            live: RwLock::new(None),
            config,
            risk: RiskEngine::new(risk),
        }
    }

    /// Load and validate the artifact at `path`, then swap it in. On error the previous model
    /// (if any) stays live.
    pub fn load(&self, path: &Path) -> Result<(), InferenceError> {
        let artifact = ModelArtifact::load(path)?;
        info!(
            path = %path.display(),
            version = %artifact.version(),
            trained_at = %artifact.trained_at(),
            "model artifact loaded"
        );
        self.swap(artifact);
        Ok(())
    }

    /// Install an in-memory artifact (e.g. straight from the trainer).
    pub fn install(&self, artifact: ModelArtifact) -> Result<(), InferenceError> {
        artifact.validate().map_err(InferenceError::InvalidArtifact)?;
        self.swap(artifact);
        Ok(())
    }

    fn swap(&self, artifact: ModelArtifact) {
        let loaded = Arc::new(LoadedModel::new(artifact));
        *self.live.write() = Some(loaded);
    }

    pub fn is_ready(&self) -> bool {
        self.live.read().is_some()
    }

    /// Version of the live artifact.
    pub fn model_version(&self) -> Option<String> {
        self.live.read().as_ref().map(|m| m.version().to_string())
    }

    pub fn snapshot(&self) -> Result<Arc<LoadedModel>, InferenceError> {
        self.live.read().clone().ok_or(InferenceError::EngineNotReady)
    }

    pub fn predict_one(&self, obs: &ShipmentObservation) -> Result<PredictionResult, InferenceError> {
        let model = self.snapshot()?;
        Ok(model.predict(obs, &self.risk)?)
    }

    /// One result per observation, in input order. Per-item failures become degraded results;
    /// only a missing model fails the call.
    pub fn predict_batch(
        &self,
        observations: &[ShipmentObservation],
    ) -> Result<Vec<PredictionResult>, InferenceError> {
        self.run_batch(
            observations,
            |obs| obs.shipment_id.as_str(),
            |model, obs| model.predict(obs, &self.risk),
        )
    }

    /// [`InferenceEngine::predict_batch`] over records read from an observations file. A record
    /// that failed to decode answers with a degraded result in its slot.
    pub fn predict_records(
        &self,
        records: &[ObservationRecord],
    ) -> Result<Vec<PredictionResult>, InferenceError> {
        self.run_batch(records, ObservationRecord::shipment_id, |model, record| match record {
            ObservationRecord::Decoded(obs) => model.predict(obs, &self.risk),
            ObservationRecord::Malformed { error, .. } => Err(error.clone()),
        })
    }

    fn run_batch<T, I, P>(
        &self,
        items: &[T],
        id_of: I,
        predict: P,
    ) -> Result<Vec<PredictionResult>, InferenceError>
    where
        T: Sync,
        I: Fn(&T) -> &str,
        P: Fn(&LoadedModel, &T) -> Result<PredictionResult, ItemError> + Sync,
    {
        let snapshot = self.snapshot()?;
        let model: &LoadedModel = &snapshot;
        let version = model.version().to_string();

        let results =
            workers::map_ordered(items, self.config.workers, |_, item| predict(model, item));

        let mut degraded = 0usize;
        let out: Vec<PredictionResult> = items
            .iter()
            .zip(results)
            .map(|(item, result)| {
                let error = match result {
                    Some(Ok(prediction)) => return prediction,
                    Some(Err(e)) => e.to_string(),
                    None => "prediction worker terminated".to_string(),
                };
                degraded += 1;
                let shipment_id = id_of(item);
                warn!(shipment_id = %shipment_id, error = %error, "prediction degraded");
                PredictionResult::degraded(shipment_id, &version, error)
            })
            .collect();

        info!(
            total = out.len(),
            degraded,
            model_version = %version,
            "batch prediction complete"
        );
        Ok(out)
    }
}
