//! Error types for the agri_forecast crate

use price_math::MathError;
use thiserror::Error;

/// Errors reported by ingestion, training and prediction.
///
/// Every variant is a recoverable condition returned to the caller.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Ingest found nothing usable after cleaning
    #[error("No data: {0}")]
    NoData(String),

    /// Not enough observations to build or train on a series
    #[error("Insufficient data for {key}: need {required} days, have {available}")]
    InsufficientData {
        key: String,
        required: usize,
        available: usize,
    },

    /// Too few training windows
    #[error("Insufficient samples for {key}: need {required} windows, have {available}")]
    InsufficientSamples {
        key: String,
        required: usize,
        available: usize,
    },

    /// Built series shorter than the model's input length
    #[error("Insufficient history for {key}: need {required} days, have {available}")]
    InsufficientHistory {
        key: String,
        required: usize,
        available: usize,
    },

    /// No persisted artifact for the key
    #[error("No trained model for {key}")]
    ModelNotFound { key: String },

    /// Requested date could not be parsed
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Training was interrupted from outside
    #[error("Training cancelled")]
    Cancelled,

    /// Error reading process configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from numeric building blocks
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from artifact (de)serialization
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<tempfile::PersistError> for ForecastError {
    fn from(err: tempfile::PersistError) -> Self {
        ForecastError::IoError(err.error)
    }
}
