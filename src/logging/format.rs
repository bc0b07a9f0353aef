//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.
//!
//! Logs go to stderr; stdout is reserved for prediction output.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::alerts::Alert;

/// Console notification for an emitted alert.
#[derive(Serialize)]
pub struct AlertNotice<'a> {
    pub ts: String,
    pub kind: &'static str,
    pub alert_id: String,
    pub shipment_id: &'a str,
    pub severity: &'static str,
    pub title: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_probability: Option<f64>,
}

impl<'a> AlertNotice<'a> {
    pub fn new(alert: &'a Alert) -> Self {
        Self {
            ts: alert.triggered_at.to_rfc3339(),
            kind: "alert",
            alert_id: alert.alert_id.to_string(),
            shipment_id: &alert.shipment_id,
            severity: alert.severity.as_str(),
            title: &alert.title,
            message: &alert.message,
            delay_probability: alert
                .metadata
                .get("delay_probability")
                .and_then(|v| v.as_f64()),
        }
    }
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber; level from RUST_LOG, else `default_level`.
    pub fn init(json: bool, default_level: &str) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }

    /// Write one value as a single JSON line, bypassing tracing.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}
