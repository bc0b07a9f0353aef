//! Turns a delay probability into the display risk tier and an estimated delay.

use crate::config::RiskConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64, config: &RiskConfig) -> Self {
        if score >= config.high_threshold {
            RiskLevel::High
        } else if score >= config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Risk assessment for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub probability: f64,
    pub level: RiskLevel,
    pub estimated_delay_minutes: u32,
}

pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, probability: f64, distance_remaining_km: f64) -> RiskAssessment {
        RiskAssessment {
            probability,
            level: RiskLevel::from_score(probability, &self.config),
            estimated_delay_minutes: self.estimated_delay_minutes(probability, distance_remaining_km),
        }
    }

    /// Zero at or below the delay threshold; otherwise `round(p * base * distance_factor)`
    /// with the distance factor capped.
    pub fn estimated_delay_minutes(&self, probability: f64, distance_remaining_km: f64) -> u32 {
        if probability <= self.config.delay_threshold {
            return 0;
        }
        let factor = (distance_remaining_km / self.config.distance_reference_km)
            .min(self.config.max_distance_factor)
            .max(0.0);
        let minutes = (probability * self.config.base_delay_minutes * factor).round();
        if minutes.is_finite() && minutes > 0.0 {
            minutes as u32
        } else {
            0
        }
    }
}
