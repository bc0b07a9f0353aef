//! Risk tiers and delay estimation.

mod engine;

pub use engine::{RiskAssessment, RiskEngine, RiskLevel};
