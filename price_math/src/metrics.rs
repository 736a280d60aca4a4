//! Error metrics for evaluating forecasts against observed prices

use crate::{MathError, Result};

/// Guard added to the denominator of percentage errors
const PERCENT_EPSILON: f64 = 1e-9;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(MathError::InvalidInput(format!(
            "Actual ({}) and predicted ({}) values must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Mean Squared Error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    Ok(sum / actual.len() as f64)
}

/// Root Mean Squared Error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mean_squared_error(actual, predicted)?.sqrt())
}

/// Mean Absolute Percentage Error, in percent.
///
/// Zero actuals do not divide by zero; they produce a very large term instead.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| ((a - p) / (a + PERCENT_EPSILON)).abs())
        .sum();

    Ok(sum / actual.len() as f64 * 100.0)
}

/// Accuracy summary reported after training
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accuracy {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
}

/// Compute RMSE and MAPE together
pub fn accuracy(actual: &[f64], predicted: &[f64]) -> Result<Accuracy> {
    Ok(Accuracy {
        rmse: root_mean_squared_error(actual, predicted)?,
        mape: mean_absolute_percentage_error(actual, predicted)?,
    })
}

impl std::fmt::Display for Accuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RMSE: {:.4}, MAPE: {:.4}%", self.rmse, self.mape)
    }
}
