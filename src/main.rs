//! Delay Risk entrypoint: offline training, batch prediction with alerting, alert maintenance.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use delay_risk::{
    alerts::{AlertDecision, AlertPolicy, AlertStore},
    config::EngineConfig,
    inference::InferenceEngine,
    logging::{AlertNotice, StructuredLogger},
    observation::read_observations,
    storage::SqliteAlertStore,
    training::{self, ModelTrainer},
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cap on active alerts listed by `summary`.
const SUMMARY_ACTIVE_LIMIT: usize = 20;

#[derive(Parser)]
#[command(name = "delay-risk", about = "Shipment delay-risk engine")]
struct Cli {
    /// Engine config (JSON). Defaults apply when the file is absent.
    #[arg(long, env = "DELAY_RISK_CONFIG_PATH", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model and publish it as the live artifact.
    Train {
        /// Observation history (JSON array). Synthetic data is used when absent or too small.
        history: Option<PathBuf>,
    },

    /// Score observations, print predictions as JSON lines and raise alerts.
    Predict {
        /// Observations to score (JSON array).
        observations: PathBuf,
    },

    /// Resolve an active alert.
    Resolve {
        alert_id: Uuid,

        /// Who resolved it.
        resolved_by: Option<String>,
    },

    /// Alert counts over the display window and the newest active alerts.
    Summary,
}

fn run_train(config: &EngineConfig, history: Option<&Path>) -> Result<(), BoxError> {
    let observations = match history {
        Some(path) => {
            let obs = training::read_history(path)?;
            info!(path = %path.display(), observations = obs.len(), "history loaded");
            obs
        }
        None => Vec::new(),
    };

    let trainer = ModelTrainer::new(config.training.clone());
    let outcome = trainer.fit(&observations)?;
    let archived = training::publish(&outcome.artifact, &config.model)?;

    info!(
        version = %outcome.report.version,
        artifact = %config.model.artifact_path.display(),
        archived = ?archived,
        "model published"
    );
    for (rank, (column, importance)) in outcome.report.feature_importance.iter().enumerate() {
        info!(rank = rank + 1, column = %column, importance, "feature importance");
    }
    let stdout = std::io::stdout();
    StructuredLogger::emit_json(&outcome.report, &mut stdout.lock())?;
    Ok(())
}

fn run_predict(config: &EngineConfig, input: &Path) -> Result<(), BoxError> {
    let records = read_observations(input)?;

    let engine = InferenceEngine::new(config.inference.clone(), config.risk.clone());
    engine.load(&config.model.artifact_path)?;
    let predictions = engine.predict_records(&records)?;

    let store = SqliteAlertStore::open(&config.alert_store_path())?;
    let policy = AlertPolicy::new(config.alerts.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut emitted = 0usize;
    for prediction in &predictions {
        StructuredLogger::emit_json(prediction, &mut out)?;
        match policy.raise(prediction, &store, Utc::now()) {
            Ok(Some(AlertDecision::Emit(alert))) => {
                emitted += 1;
                StructuredLogger::emit_json(&AlertNotice::new(&alert), &mut std::io::stderr())?;
            }
            Ok(_) => {}
            Err(e) => warn!(shipment_id = %prediction.shipment_id, error = %e, "alert not recorded"),
        }
    }
    out.flush()?;

    info!(predictions = predictions.len(), alerts = emitted, "predict complete");
    Ok(())
}

fn run_resolve(config: &EngineConfig, alert_id: Uuid, resolved_by: Option<&str>) -> Result<(), BoxError> {
    let store = SqliteAlertStore::open(&config.alert_store_path())?;
    let alert = store.resolve(alert_id, resolved_by, Utc::now())?;
    info!(alert_id = %alert.alert_id, shipment_id = %alert.shipment_id, resolved_by = ?resolved_by, "alert resolved");
    Ok(())
}

fn run_summary(config: &EngineConfig) -> Result<(), BoxError> {
    let store = SqliteAlertStore::open(&config.alert_store_path())?;
    let hours = config.alerts.display_window_hours.min(i64::MAX as u64 / 3600) as i64;
    let since = Utc::now()
        .checked_sub_signed(Duration::hours(hours))
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    StructuredLogger::emit_json(&store.summary(since)?, &mut out)?;
    for alert in store.active_alerts(SUMMARY_ACTIVE_LIMIT)? {
        StructuredLogger::emit_json(&alert, &mut out)?;
    }
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %cli.config.display(), "delay-risk starting");

    match cli.command {
        Command::Train { history } => run_train(&config, history.as_deref()),
        Command::Predict { observations } => run_predict(&config, &observations),
        Command::Resolve {
            alert_id,
            resolved_by,
        } => run_resolve(&config, alert_id, resolved_by.as_deref()),
        Command::Summary => run_summary(&config),
    }
}
