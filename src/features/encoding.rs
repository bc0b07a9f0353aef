//! Frozen categorical lookup tables. Fitted once on the training split, embedded in the artifact,
//! and consulted read-only at inference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved code for values outside the trained domain (and for missing values).
pub const FALLBACK_CODE: u32 = 0;

/// Domain → code table for one categorical field. Trained codes start at 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    codes: BTreeMap<String, u32>,
}

impl CategoryTable {
    /// Codes are assigned in sorted order of the distinct values.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut domain: Vec<&str> = values.into_iter().collect();
        domain.sort_unstable();
        domain.dedup();
        let codes = domain
            .into_iter()
            .zip(1u32..)
            .map(|(v, code)| (v.to_string(), code))
            .collect();
        Self { codes }
    }

    pub fn encode(&self, value: Option<&str>) -> u32 {
        value
            .and_then(|v| self.codes.get(v).copied())
            .unwrap_or(FALLBACK_CODE)
    }

    pub fn domain(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes must be unique and never collide with the fallback.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for (value, code) in &self.codes {
            if *code == FALLBACK_CODE {
                return Err(format!("value {value:?} uses the reserved fallback code"));
            }
            if !seen.insert(*code) {
                return Err(format!("code {code} assigned twice"));
            }
        }
        Ok(())
    }
}

/// Field name → table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoricalEncoders {
    tables: BTreeMap<String, CategoryTable>,
}

impl CategoricalEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, table: CategoryTable) {
        self.tables.insert(field.into(), table);
    }

    pub fn with(mut self, field: impl Into<String>, table: CategoryTable) -> Self {
        self.insert(field, table);
        self
    }

    pub fn table(&self, field: &str) -> Option<&CategoryTable> {
        self.tables.get(field)
    }

    /// Unknown field and unknown value both encode to [`FALLBACK_CODE`].
    pub fn encode(&self, field: &str, value: Option<&str>) -> u32 {
        self.tables
            .get(field)
            .map(|t| t.encode(value))
            .unwrap_or(FALLBACK_CODE)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for (field, table) in &self.tables {
            table.validate().map_err(|e| format!("encoder {field}: {e}"))?;
        }
        Ok(())
    }
}
