//! Reversible mean/variance normalization
//!
//! A fitted [`StandardScaler`] is plain data: it can be serialized next to a
//! trained model and reused unchanged at inference time.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Z-score scaler: `(x - mean) / scale`.
///
/// A constant series has no spread; its scale falls back to 1 so the
/// transform stays invertible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    const EPSILON: f64 = 1e-10;

    /// Fit normalization parameters on the full series
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit scaler on empty values".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Cannot fit scaler on non-finite values".to_string(),
            ));
        }

        let mean = values.mean();
        let std = values.population_std_dev();
        let scale = if std.is_finite() && std > Self::EPSILON {
            std
        } else {
            1.0
        };

        Ok(Self { mean, scale })
    }

    /// Fitted mean
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Fitted scale (population standard deviation, or 1 for a constant series)
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Scale a single value
    pub fn transform_value(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    /// Map a single scaled value back to the original units
    pub fn inverse_value(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }

    /// Scale a slice of values
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform_value(v)).collect()
    }

    /// Map scaled values back to the original units
    pub fn inverse(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse_value(v)).collect()
    }
}
