use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use super::{Alert, AlertDecision, AlertStore, InsertOutcome, Severity};
use crate::config::AlertConfig;
use crate::error::AlertError;
use crate::inference::PredictionResult;

const MAX_WINDOW_SECS: u64 = (i64::MAX / 1000) as u64;

/// Threshold, severity and dedup rules applied to predictions.
pub struct AlertPolicy {
    config: AlertConfig,
}

impl AlertPolicy {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::seconds(self.config.dedup_window_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// Alerts triggered after this instant fall inside the dedup window.
    pub fn dedup_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.dedup_window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// At or above the threshold. Degraded results carry a placeholder probability and never alert.
    pub fn should_alert(&self, prediction: &PredictionResult) -> bool {
        !prediction.is_degraded() && prediction.delay_probability >= self.config.threshold
    }

    pub fn severity(&self, prediction: &PredictionResult) -> Severity {
        if prediction.delay_probability >= self.config.high_severity_threshold {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Decide against a caller-supplied view of existing alerts. `None` when the prediction does
    /// not warrant an alert.
    pub fn decide(
        &self,
        prediction: &PredictionResult,
        existing: &[Alert],
        now: DateTime<Utc>,
    ) -> Option<AlertDecision> {
        if !self.should_alert(prediction) {
            return None;
        }
        let since = self.dedup_since(now);
        let blocking = existing
            .iter()
            .find(|a| a.blocks(&prediction.shipment_id, &self.config.alert_type, since));
        Some(match blocking {
            Some(a) => AlertDecision::Suppressed {
                existing: a.alert_id,
            },
            None => AlertDecision::Emit(self.build_alert(prediction, now)),
        })
    }

    /// Decide and record in one step. The store's conditional insert makes the dedup check
    /// atomic, so concurrent triggers for one key emit at most once per window.
    pub fn raise(
        &self,
        prediction: &PredictionResult,
        store: &dyn AlertStore,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertDecision>, AlertError> {
        if !self.should_alert(prediction) {
            return Ok(None);
        }
        let alert = self.build_alert(prediction, now);
        let since = self.dedup_since(now);
        let decision = match store.insert_if_no_active(&alert, since)? {
            InsertOutcome::Inserted => {
                info!(
                    alert_id = %alert.alert_id,
                    shipment_id = %alert.shipment_id,
                    severity = alert.severity.as_str(),
                    probability = prediction.delay_probability,
                    "alert emitted"
                );
                AlertDecision::Emit(alert)
            }
            InsertOutcome::Conflict(existing) => {
                info!(
                    shipment_id = %prediction.shipment_id,
                    existing = %existing,
                    "alert suppressed"
                );
                AlertDecision::Suppressed { existing }
            }
        };
        Ok(Some(decision))
    }

    fn build_alert(&self, prediction: &PredictionResult, now: DateTime<Utc>) -> Alert {
        let metadata = match serde_json::to_value(prediction) {
            Ok(serde_json::Value::Object(m)) => m,
            _ => serde_json::Map::new(),
        };
        Alert {
            alert_id: Uuid::new_v4(),
            shipment_id: prediction.shipment_id.clone(),
            alert_type: self.config.alert_type.clone(),
            severity: self.severity(prediction),
            title: format!("High Delay Risk - {}", prediction.shipment_id),
            message: format!(
                "Shipment has {:.1}% probability of delay. Estimated delay: {} minutes.",
                prediction.delay_probability * 100.0,
                prediction.estimated_delay_minutes
            ),
            metadata,
            triggered_at: now,
            is_active: true,
            resolved_at: None,
            resolved_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;
    use std::collections::BTreeMap;

    fn prediction(p: f64) -> PredictionResult {
        PredictionResult {
            shipment_id: "S1".into(),
            delay_probability: p,
            risk_level: RiskLevel::High,
            estimated_delay_minutes: 100,
            prediction_timestamp: Utc::now(),
            model_version: "1.0.0".into(),
            features: BTreeMap::new(),
            error: None,
        }
    }

    #[test]
    fn threshold_and_severity() {
        let policy = AlertPolicy::new(AlertConfig::default());
        assert!(policy.should_alert(&prediction(0.75)));
        assert!(policy.should_alert(&prediction(0.7)));
        assert!(!policy.should_alert(&prediction(0.65)));
        assert_eq!(policy.severity(&prediction(0.75)), Severity::Medium);
        assert_eq!(policy.severity(&prediction(0.85)), Severity::High);
    }

    #[test]
    fn degraded_never_alerts() {
        let policy = AlertPolicy::new(AlertConfig {
            threshold: 0.3,
            ..AlertConfig::default()
        });
        let p = PredictionResult::degraded("S1", "1.0.0", "bad timestamp");
        assert!(!policy.should_alert(&p));
        assert_eq!(policy.decide(&p, &[], Utc::now()), None);
    }

    #[test]
    fn decide_dedups_within_window() {
        let policy = AlertPolicy::new(AlertConfig::default());
        let t0 = Utc::now();
        let first = match policy.decide(&prediction(0.9), &[], t0) {
            Some(AlertDecision::Emit(a)) => a,
            other => panic!("expected emit, got {other:?}"),
        };
        assert_eq!(first.title, "High Delay Risk - S1");
        assert_eq!(
            first.message,
            "Shipment has 90.0% probability of delay. Estimated delay: 100 minutes."
        );
        assert_eq!(first.metadata["estimated_delay_minutes"], 100);

        let existing = vec![first.clone()];
        assert_eq!(
            policy.decide(&prediction(0.9), &existing, t0 + Duration::minutes(30)),
            Some(AlertDecision::Suppressed {
                existing: first.alert_id
            })
        );
        assert!(matches!(
            policy.decide(&prediction(0.9), &existing, t0 + Duration::minutes(61)),
            Some(AlertDecision::Emit(_))
        ));

        let mut resolved = first;
        resolved.resolve(Some("ops"), t0).unwrap();
        assert!(matches!(
            policy.decide(&prediction(0.9), &[resolved], t0 + Duration::minutes(1)),
            Some(AlertDecision::Emit(_))
        ));
    }

    #[test]
    fn other_shipments_do_not_block() {
        let policy = AlertPolicy::new(AlertConfig::default());
        let now = Utc::now();
        let mut other = prediction(0.9);
        other.shipment_id = "S2".into();
        let Some(AlertDecision::Emit(a)) = policy.decide(&other, &[], now) else {
            panic!("expected emit");
        };
        assert!(matches!(
            policy.decide(&prediction(0.9), &[a], now),
            Some(AlertDecision::Emit(_))
        ));
    }
}
