//! Shipment observations as delivered by the ingestion collaborator, plus the coercion and
//! labeling rules shared by training and serving.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{InputError, ItemError};

/// Substituted when `distance_remaining_km` is missing or not a number.
pub const DEFAULT_DISTANCE_KM: f64 = 1000.0;
/// Substituted when `vehicle_speed_kmph` is missing or not a number.
pub const DEFAULT_SPEED_KMPH: f64 = 60.0;

/// Numeric field as it arrives on the wire: upstream producers send both numbers and strings.
/// Anything else is kept as-is and coerces to the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
    Other(Value),
}

impl From<f64> for RawNumber {
    fn from(v: f64) -> Self {
        RawNumber::Number(v)
    }
}

/// Outcome of coercing a raw field. `Defaulted` is a silent fallback, never an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    Parsed(T),
    Defaulted(T),
}

impl<T: Copy> Coerced<T> {
    pub fn value(&self) -> T {
        match *self {
            Coerced::Parsed(v) | Coerced::Defaulted(v) => v,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Coerced::Defaulted(_))
    }
}

/// Coerce to a finite number, falling back to `default`.
pub fn coerce_number(raw: Option<&RawNumber>, default: f64) -> Coerced<f64> {
    let parsed = match raw {
        Some(RawNumber::Number(v)) => Some(*v),
        Some(RawNumber::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(RawNumber::Other(_)) | None => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Coerced::Parsed(v),
        _ => Coerced::Defaulted(default),
    }
}

/// Accepts RFC 3339 and the naive ISO forms the upstream producers emit (read as UTC).
/// The sender's offset is kept: time-of-day features use its wall clock.
pub fn parse_local_timestamp(value: &str) -> Result<DateTime<FixedOffset>, ItemError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(ItemError::InvalidTimestamp {
        value: value.to_string(),
    })
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ItemError> {
    parse_local_timestamp(value).map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    #[serde(rename = "In Transit")]
    InTransit,
    #[serde(rename = "At Hub")]
    AtHub,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delayed,
    Delivered,
    #[serde(other)]
    Other,
}

impl ShipmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Delayed)
    }
}

/// Point-in-time snapshot of one shipment. Read-only input to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentObservation {
    pub shipment_id: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub current_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_remaining_km: Option<RawNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_speed_kmph: Option<RawNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_level: Option<String>,
    /// ISO-8601; "now" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Training only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipmentStatus>,
    /// Training only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    /// Training only: time of the last status update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ShipmentObservation {
    pub fn new(shipment_id: impl Into<String>) -> Self {
        Self {
            shipment_id: shipment_id.into(),
            ..Default::default()
        }
    }

    pub fn distance_km(&self) -> Coerced<f64> {
        coerce_number(self.distance_remaining_km.as_ref(), DEFAULT_DISTANCE_KM)
    }

    pub fn speed_kmph(&self) -> Coerced<f64> {
        coerce_number(self.vehicle_speed_kmph.as_ref(), DEFAULT_SPEED_KMPH)
    }

    /// Raw value of a categorical field by name; unknown fields read as absent.
    pub fn categorical(&self, field: &str) -> Option<&str> {
        match field {
            "weather" => self.weather.as_deref(),
            "traffic_level" => self.traffic_level.as_deref(),
            "origin" => Some(self.origin.as_str()),
            "destination" => Some(self.destination.as_str()),
            _ => None,
        }
    }

    /// Delay label: terminal status `Delayed`, or last update after the ETA.
    /// `None` for shipments that have not reached a terminal status.
    pub fn delay_label(&self) -> Option<bool> {
        let status = self.status?;
        if !status.is_terminal() {
            return None;
        }
        if status == ShipmentStatus::Delayed {
            return Some(true);
        }
        let late = match (self.updated_at.as_deref(), self.eta.as_deref()) {
            (Some(updated), Some(eta)) => match (parse_timestamp(updated), parse_timestamp(eta)) {
                (Ok(updated), Ok(eta)) => updated > eta,
                _ => false,
            },
            _ => false,
        };
        Some(late)
    }
}

/// One entry of an observations file. A record that does not decode keeps its slot so the
/// batch can answer for it.
#[derive(Debug, Clone)]
pub enum ObservationRecord {
    Decoded(ShipmentObservation),
    Malformed { shipment_id: String, error: ItemError },
}

impl ObservationRecord {
    pub fn from_value(value: Value) -> Self {
        let shipment_id = value
            .get("shipment_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value(value) {
            Ok(obs) => ObservationRecord::Decoded(obs),
            Err(e) => ObservationRecord::Malformed {
                shipment_id,
                error: ItemError::Malformed(e.to_string()),
            },
        }
    }

    pub fn shipment_id(&self) -> &str {
        match self {
            ObservationRecord::Decoded(obs) => &obs.shipment_id,
            ObservationRecord::Malformed { shipment_id, .. } => shipment_id,
        }
    }
}

/// Read a JSON array of observations, decoding each element on its own.
pub fn read_observations(path: &Path) -> Result<Vec<ObservationRecord>, InputError> {
    let bytes = std::fs::read(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let values: Vec<Value> = serde_json::from_slice(&bytes).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(values.into_iter().map(ObservationRecord::from_value).collect())
}

/// Observation paired with its training label.
#[derive(Debug, Clone)]
pub struct LabeledObservation {
    pub observation: ShipmentObservation,
    pub delayed: bool,
}

impl LabeledObservation {
    /// Keeps terminal shipments with distance remaining and a usable timestamp.
    pub fn from_history(observation: ShipmentObservation) -> Option<Self> {
        let delayed = observation.delay_label()?;
        if observation.distance_km().value() <= 0.0 {
            return None;
        }
        if let Some(ts) = observation.timestamp.as_deref() {
            parse_timestamp(ts).ok()?;
        }
        Some(Self {
            observation,
            delayed,
        })
    }
}
