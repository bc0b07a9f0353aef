//! Observation → fixed-order numeric vector. The same engineer, bound to the artifact's columns
//! and encoders, is used to build training rows and serving rows.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use super::{CategoricalEncoders, FeatureVector};
use crate::error::ItemError;
use crate::observation::{parse_local_timestamp, ShipmentObservation};

/// Canonical column order written into new artifacts.
pub const DEFAULT_FEATURE_COLUMNS: [&str; 10] = [
    "distance_remaining_km",
    "vehicle_speed_kmph",
    "weather_encoded",
    "traffic_level_encoded",
    "hour_of_day",
    "day_of_week",
    "is_weekend",
    "origin_risk_score",
    "destination_risk_score",
    "route_complexity",
];

/// Categorical fields encoded through the artifact's tables.
pub const CATEGORICAL_FIELDS: [&str; 2] = ["weather", "traffic_level"];

/// Placeholder origin/destination risk until historical lookups exist.
pub const BASELINE_LOCATION_RISK: f64 = 0.1;

pub fn default_feature_columns() -> Vec<String> {
    DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    columns: Vec<String>,
    encoders: CategoricalEncoders,
}

impl FeatureEngineer {
    pub fn new(columns: Vec<String>, encoders: CategoricalEncoders) -> Self {
        Self { columns, encoders }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn encoders(&self) -> &CategoricalEncoders {
        &self.encoders
    }

    /// Build with "now" substituted for a missing observation timestamp.
    pub fn build(&self, obs: &ShipmentObservation) -> Result<FeatureVector, ItemError> {
        self.build_at(obs, Utc::now())
    }

    /// Deterministic for a given observation and `now`.
    pub fn build_at(
        &self,
        obs: &ShipmentObservation,
        now: DateTime<Utc>,
    ) -> Result<FeatureVector, ItemError> {
        let ts = computed_ts(obs, now)?;
        let computed = self.computed_fields(obs, ts);
        let values: Vec<f64> = self
            .columns
            .iter()
            .map(|col| {
                computed
                    .iter()
                    .find(|(name, _)| *name == col.as_str())
                    .map(|(_, v)| *v)
                    .unwrap_or(0.0)
            })
            .collect();

        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ItemError::NonFiniteFeature {
                column: self.columns[i].clone(),
                value: *v,
            });
        }

        Ok(FeatureVector {
            dim: values.len(),
            values,
            shipment_id: obs.shipment_id.clone(),
            ts: ts.timestamp_millis(),
        })
    }

    /// Column name → unscaled value.
    pub fn snapshot(&self, fv: &FeatureVector) -> BTreeMap<String, f64> {
        self.columns
            .iter()
            .cloned()
            .zip(fv.values.iter().copied())
            .collect()
    }

    fn computed_fields(
        &self,
        obs: &ShipmentObservation,
        ts: DateTime<FixedOffset>,
    ) -> [(&'static str, f64); 10] {
        let distance = obs.distance_km();
        let speed = obs.speed_kmph();
        if distance.is_defaulted() || speed.is_defaulted() {
            debug!(
                shipment_id = %obs.shipment_id,
                distance_defaulted = distance.is_defaulted(),
                speed_defaulted = speed.is_defaulted(),
                "numeric field defaulted"
            );
        }
        let (distance, speed) = (distance.value(), speed.value());

        // Sender's wall clock, not UTC.
        let local = ts.naive_local();
        let day_of_week = local.weekday().num_days_from_monday();

        [
            ("distance_remaining_km", distance),
            ("vehicle_speed_kmph", speed),
            (
                "weather_encoded",
                self.encoders.encode("weather", obs.categorical("weather")) as f64,
            ),
            (
                "traffic_level_encoded",
                self.encoders
                    .encode("traffic_level", obs.categorical("traffic_level")) as f64,
            ),
            ("hour_of_day", local.hour() as f64),
            ("day_of_week", day_of_week as f64),
            ("is_weekend", if day_of_week >= 5 { 1.0 } else { 0.0 }),
            ("origin_risk_score", BASELINE_LOCATION_RISK),
            ("destination_risk_score", BASELINE_LOCATION_RISK),
            ("route_complexity", distance / (speed + 1.0) / 100.0),
        ]
    }
}

fn computed_ts(
    obs: &ShipmentObservation,
    now: DateTime<Utc>,
) -> Result<DateTime<FixedOffset>, ItemError> {
    match obs.timestamp.as_deref() {
        Some(ts) => parse_local_timestamp(ts),
        None => Ok(now.fixed_offset()),
    }
}
