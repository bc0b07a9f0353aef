//! Structured logging setup and ndjson emission.

mod format;

pub use format::{AlertNotice, StructuredLogger};
