use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::{Alert, Severity};
use crate::error::AlertError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Id of the active alert that blocked the insert
    Conflict(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: u64,
    pub active: u64,
    pub resolved: u64,
    pub high: u64,
    pub medium: u64,
}

/// Backing store for alerts. `insert_if_no_active` must be atomic with respect to other callers.
pub trait AlertStore: Send + Sync {
    /// Insert `alert` unless an active alert with the same (shipment_id, alert_type) was
    /// triggered after `since`.
    fn insert_if_no_active(
        &self,
        alert: &Alert,
        since: DateTime<Utc>,
    ) -> Result<InsertOutcome, AlertError>;

    fn resolve(
        &self,
        alert_id: Uuid,
        resolved_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Alert, AlertError>;

    fn get(&self, alert_id: Uuid) -> Result<Option<Alert>, AlertError>;

    /// Active alerts, newest first.
    fn active_alerts(&self, limit: usize) -> Result<Vec<Alert>, AlertError>;

    /// Counts over alerts triggered at or after `since`.
    fn summary(&self, since: DateTime<Utc>) -> Result<AlertSummary, AlertError>;
}

/// Process-local store; the mutex is held across the dedup check and the insert.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

impl AlertStore for MemoryAlertStore {
    fn insert_if_no_active(
        &self,
        alert: &Alert,
        since: DateTime<Utc>,
    ) -> Result<InsertOutcome, AlertError> {
        let mut alerts = self.alerts.lock();
        if let Some(existing) = alerts
            .iter()
            .find(|a| a.blocks(&alert.shipment_id, &alert.alert_type, since))
        {
            return Ok(InsertOutcome::Conflict(existing.alert_id));
        }
        alerts.push(alert.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn resolve(
        &self,
        alert_id: Uuid,
        resolved_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let mut alerts = self.alerts.lock();
        let alert = alerts
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
            .ok_or(AlertError::NotFound(alert_id))?;
        alert.resolve(resolved_by, at)?;
        Ok(alert.clone())
    }

    fn get(&self, alert_id: Uuid) -> Result<Option<Alert>, AlertError> {
        Ok(self
            .alerts
            .lock()
            .iter()
            .find(|a| a.alert_id == alert_id)
            .cloned())
    }

    fn active_alerts(&self, limit: usize) -> Result<Vec<Alert>, AlertError> {
        let mut active: Vec<Alert> = self
            .alerts
            .lock()
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        active.truncate(limit);
        Ok(active)
    }

    fn summary(&self, since: DateTime<Utc>) -> Result<AlertSummary, AlertError> {
        let mut s = AlertSummary::default();
        for a in self.alerts.lock().iter().filter(|a| a.triggered_at >= since) {
            s.total += 1;
            if a.is_active {
                s.active += 1;
            } else {
                s.resolved += 1;
            }
            match a.severity {
                Severity::High => s.high += 1,
                Severity::Medium => s.medium += 1,
            }
        }
        Ok(s)
    }
}
