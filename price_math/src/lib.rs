//! # Price Math
//!
//! Numeric building blocks for daily price forecasting.
//! This crate holds the pure, allocation-light pieces of the pipeline:
//! linear gap filling, reversible normalization, supervised windowing and
//! forecast error metrics.

use thiserror::Error;

pub mod interpolate;
pub mod metrics;
pub mod scaler;
pub mod windows;

pub use scaler::StandardScaler;
pub use windows::{make_windows, window_count, Window};

/// Errors that can occur in price calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for price math operations
pub type Result<T> = std::result::Result<T, MathError>;
