//! Versioned model artifact: classifier, scaler, encoders and column order persisted as one unit.
//!
//! On disk: a one-line JSON header carrying the format and a SHA-256 of the payload, then the
//! artifact JSON. Writes go through a temp file in the target directory and a rename, so readers
//! see either the previous bundle or the complete new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use super::{RandomForest, StandardScaler};
use crate::error::ArtifactError;
use crate::features::{CategoricalEncoders, FeatureEngineer};

pub const ARTIFACT_FORMAT: u32 = 1;

/// Payload keys a loadable bundle must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "model",
    "scaler",
    "feature_encoders",
    "feature_columns",
    "trained_at",
    "version",
];

#[derive(Serialize, Deserialize)]
struct Header {
    format: u32,
    sha256: String,
}

/// Where the training rows came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TrainingSource {
    Historical {
        samples: usize,
    },
    Synthetic {
        samples: usize,
        seed: u64,
    },
    #[default]
    Unknown,
}

impl TrainingSource {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, TrainingSource::Synthetic { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    model: RandomForest,
    scaler: StandardScaler,
    feature_encoders: CategoricalEncoders,
    feature_columns: Vec<String>,
    trained_at: DateTime<Utc>,
    version: String,
    #[serde(default)]
    provenance: TrainingSource,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl ModelArtifact {
    pub fn new(
        model: RandomForest,
        scaler: StandardScaler,
        feature_encoders: CategoricalEncoders,
        feature_columns: Vec<String>,
        version: impl Into<String>,
        trained_at: DateTime<Utc>,
        provenance: TrainingSource,
    ) -> Self {
        Self {
            model,
            scaler,
            feature_encoders,
            feature_columns,
            trained_at,
            version: version.into(),
            provenance,
        }
    }

    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn feature_encoders(&self) -> &CategoricalEncoders {
        &self.feature_encoders
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn provenance(&self) -> &TrainingSource {
        &self.provenance
    }

    /// Engineer bound to this artifact's columns and encoders.
    pub fn feature_engineer(&self) -> FeatureEngineer {
        FeatureEngineer::new(self.feature_columns.clone(), self.feature_encoders.clone())
    }

    /// Columns ranked by the forest's impurity importance, highest first.
    pub fn feature_importance_ranking(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_columns
            .iter()
            .cloned()
            .zip(self.model.feature_importances().iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Structural checks shared by load and in-process install.
    pub fn validate(&self) -> Result<(), String> {
        if self.version.trim().is_empty() {
            return Err("empty version".to_string());
        }
        let dim = self.feature_columns.len();
        if dim == 0 {
            return Err("no feature columns".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.feature_columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(format!("duplicate feature column {dup}"));
        }
        self.scaler.validate(dim)?;
        self.model.validate(dim)?;
        self.feature_encoders.validate()
    }

    pub fn archive_file_name(&self) -> String {
        format!(
            "delay_predictor-{}-{}.json",
            self.version,
            self.trained_at.format("%Y%m%dT%H%M%S")
        )
    }

    /// Atomic write to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let payload = serde_json::to_vec(self)?;
        let header = serde_json::to_vec(&Header {
            format: ARTIFACT_FORMAT,
            sha256: sha256_hex(&payload),
        })?;

        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        let written = File::create(&tmp).and_then(|mut f| {
            f.write_all(&header)?;
            f.write_all(b"\n")?;
            f.write_all(&payload)?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(e));
        }

        info!(path = %path.display(), version = %self.version, "model artifact saved");
        Ok(())
    }

    /// Save a versioned copy under `dir`, keyed by version and training time.
    pub fn save_versioned(&self, dir: &Path) -> Result<PathBuf, ArtifactError> {
        let path = dir.join(self.archive_file_name());
        self.save(&path)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::Missing {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let split = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| ArtifactError::corrupt(path, "missing header line"))?;
        let (head, payload) = (&bytes[..split], &bytes[split + 1..]);
        let header: Header = serde_json::from_slice(head)
            .map_err(|e| ArtifactError::corrupt(path, format!("bad header: {e}")))?;
        if header.format != ARTIFACT_FORMAT {
            return Err(ArtifactError::corrupt(
                path,
                format!("unsupported format {}", header.format),
            ));
        }
        if sha256_hex(payload) != header.sha256 {
            return Err(ArtifactError::corrupt(path, "checksum mismatch"));
        }

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| ArtifactError::corrupt(path, format!("payload is not JSON: {e}")))?;
        let obj = value
            .as_object()
            .ok_or_else(|| ArtifactError::corrupt(path, "payload is not an object"))?;
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !obj.contains_key(*f))
            .collect();
        if !missing.is_empty() {
            return Err(ArtifactError::corrupt(
                path,
                format!("missing fields: {}", missing.join(", ")),
            ));
        }

        let artifact: ModelArtifact = serde_json::from_value(value)
            .map_err(|e| ArtifactError::corrupt(path, e.to_string()))?;
        artifact
            .validate()
            .map_err(|reason| ArtifactError::corrupt(path, reason))?;
        Ok(artifact)
    }
}
