//! Delay Risk: shipment delay-risk inference engine.
//!
//! Modular structure:
//! - [`features`]: Observation → fixed-order feature vector, frozen categorical encoders
//! - [`model`]: Random forest, scaler and the versioned artifact bundling them
//! - [`training`]: Offline trainer with grid search and synthetic fallback
//! - [`inference`]: Single and batch prediction with per-item fault isolation
//! - [`risk`]: Risk tiers and delay estimate
//! - [`alerts`]: Alert threshold, severity and dedup policy
//! - [`storage`]: SQLite alert store
//! - [`logging`]: Structured JSON logging

pub mod alerts;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod logging;
pub mod model;
pub mod observation;
pub mod risk;
pub mod storage;
pub mod training;
pub mod workers;

pub use alerts::{Alert, AlertDecision, AlertPolicy, AlertStore, Severity};
pub use config::EngineConfig;
pub use features::{FeatureEngineer, FeatureVector};
pub use inference::{InferenceEngine, PredictionResult};
pub use logging::StructuredLogger;
pub use model::ModelArtifact;
pub use observation::ShipmentObservation;
pub use risk::{RiskEngine, RiskLevel};
pub use storage::SqliteAlertStore;
pub use training::ModelTrainer;
