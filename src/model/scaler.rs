//! Per-column standardization fitted on the training split.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ItemError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Population standard deviation; constant columns get scale 1.
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let n_cols = x.ncols();
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_cols));
        let std = x.std_axis(Axis(0), 0.0);
        let scale = std
            .iter()
            .map(|s| if s.is_finite() && *s > f64::EPSILON { *s } else { 1.0 })
            .collect();
        Self {
            mean: mean.to_vec(),
            scale,
        }
    }

    /// Pass-through scaler of the given width.
    pub fn identity(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, ItemError> {
        if values.len() != self.dim() {
            return Err(ItemError::DimensionMismatch {
                expected: self.dim(),
                actual: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform_matrix(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        (&x - &mean) / &scale
    }

    pub(crate) fn validate(&self, dim: usize) -> Result<(), String> {
        if self.mean.len() != dim || self.scale.len() != dim {
            return Err(format!(
                "scaler width {}/{} does not match {dim} feature columns",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0)
            || self.mean.iter().any(|m| !m.is_finite())
        {
            return Err("scaler holds non-finite or zero parameters".to_string());
        }
        Ok(())
    }
}
