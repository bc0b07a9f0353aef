//! Alert decisions for high delay-risk predictions.
//!
//! An alert is keyed by (shipment_id, alert_type). It starts active and can only move to resolved;
//! a later trigger for the same key creates a new alert.

mod policy;
mod store;

pub use policy::AlertPolicy;
pub use store::{AlertStore, AlertSummary, InsertOutcome, MemoryAlertStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AlertError;

/// Two-tier alert severity; coarser than the prediction's risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "High" => Some(Severity::High),
            "Medium" => Some(Severity::Medium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub shipment_id: String,
    pub alert_type: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Probability, estimate and model version that triggered the alert
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub triggered_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl Alert {
    /// True if this alert suppresses a new one for `(shipment_id, alert_type)` triggered after
    /// `since`.
    pub fn blocks(&self, shipment_id: &str, alert_type: &str, since: DateTime<Utc>) -> bool {
        self.is_active
            && self.shipment_id == shipment_id
            && self.alert_type == alert_type
            && self.triggered_at > since
    }

    /// Active → resolved. Resolution is terminal.
    pub fn resolve(
        &mut self,
        resolved_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), AlertError> {
        if !self.is_active {
            return Err(AlertError::AlreadyResolved(self.alert_id));
        }
        self.is_active = false;
        self.resolved_at = Some(at);
        self.resolved_by = resolved_by.map(str::to_string);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    Emit(Alert),
    /// An active alert for the key already exists inside the dedup window.
    Suppressed { existing: Uuid },
}
