//! Engine configuration. Every component receives its section explicitly; nothing is read from
//! ambient globals after startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Data directory (alert store)
    pub data_dir: PathBuf,
    /// Artifact locations
    pub model: ModelConfig,
    /// Offline training parameters
    pub training: TrainingConfig,
    /// Batch inference parameters
    pub inference: InferenceConfig,
    /// Risk tiers and delay estimate
    pub risk: RiskConfig,
    /// Alert threshold, severity and dedup window
    pub alerts: AlertConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Live artifact consumed by inference
    pub artifact_path: PathBuf,
    /// Versioned copies of every published artifact
    pub archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Below this many labeled observations the trainer switches to synthetic data
    pub min_samples: usize,
    pub synthetic_samples: usize,
    pub seed: u64,
    /// Held-out share for the final evaluation
    pub test_fraction: f64,
    pub cv_folds: usize,
    /// Semantic version base; build metadata is appended per run
    pub version: String,
    /// Parallel grid candidates
    pub workers: usize,
    pub grid: ParamGrid,
}

/// Hyperparameter grid searched by the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Upper bound on threads evaluating one batch; 1 runs inline
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Probability at or above this is High risk
    pub high_threshold: f64,
    /// Probability at or above this is Medium risk
    pub medium_threshold: f64,
    /// Delay minutes are only estimated above this probability
    pub delay_threshold: f64,
    pub base_delay_minutes: f64,
    pub distance_reference_km: f64,
    pub max_distance_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: f64,
    /// Alerts at or above this probability carry High severity
    pub high_severity_threshold: f64,
    pub dedup_window_secs: u64,
    /// Lookback used for summaries; independent of the dedup window
    pub display_window_hours: u64,
    pub alert_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config {path:?}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".delay-risk"),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            inference: InferenceConfig::default(),
            risk: RiskConfig::default(),
            alerts: AlertConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("models/delay_predictor.json"),
            archive_dir: Some(PathBuf::from("models/archive")),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: 100,
            synthetic_samples: 5000,
            seed: 42,
            test_fraction: 0.2,
            cv_folds: 5,
            version: "1.0.0".to_string(),
            workers: 4,
            grid: ParamGrid::default(),
        }
    }
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![10, 15, 20],
            min_samples_split: vec![5, 10],
            min_samples_leaf: vec![2, 4],
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.7,
            medium_threshold: 0.4,
            delay_threshold: 0.5,
            base_delay_minutes: 120.0,
            distance_reference_km: 1000.0,
            max_distance_factor: 2.0,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            high_severity_threshold: 0.8,
            dedup_window_secs: 3600,
            display_window_hours: 24,
            alert_type: "delay_prediction".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return default. A file that exists but cannot
    /// be read, parsed or validated is an error, never a silent fallback.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let risk = &self.risk;
        if !(risk.max_distance_factor.is_finite() && risk.max_distance_factor >= 0.0) {
            return Err(format!(
                "risk.max_distance_factor must be >= 0, got {}",
                risk.max_distance_factor
            ));
        }
        for (name, v) in [
            ("risk.high_threshold", risk.high_threshold),
            ("risk.medium_threshold", risk.medium_threshold),
            ("alerts.threshold", self.alerts.threshold),
            ("alerts.high_severity_threshold", self.alerts.high_severity_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{name} must be within [0, 1], got {v}"));
            }
        }
        Ok(())
    }

    pub fn alert_store_path(&self) -> PathBuf {
        self.data_dir.join("alerts.db")
    }
}
