//! # Agri Forecast
//!
//! Daily commodity price forecasting, one model per (region, commodity).
//!
//! ## Features
//!
//! - CSV ingest with header aliases, per-row validation and a trailing history window
//! - Dense daily series with averaged duplicates and linear gap filling
//! - Standard scaling and supervised windowing (see the `price_math` crate)
//! - A linear sequence model trained with mini-batch Adam and early stopping
//! - Atomic, per-key model artifacts holding scaler, weights and holdout metrics
//! - Anchor-date forecasting: a date's forecast is the same whenever it is asked for
//!
//! ## Anchor dates
//!
//! Recursive generation always starts the day after the last historical
//! observation (the *anchor date*). A request for a later date takes its
//! window from the same forward path; a request for a date inside history is
//! clamped to the anchor date and flagged as such.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agri_forecast::{ForecastConfig, ForecastService};
//!
//! # fn main() -> agri_forecast::Result<()> {
//! let service = ForecastService::new(ForecastConfig::from_env()?)?;
//!
//! // Ingest a raw export (Date, State, District, Crop, Modal Price, ...)
//! let report = service.ingest_csv("prices.csv")?;
//! println!("persisted {} rows", report.rows_persisted);
//!
//! // Train one key
//! let metrics = service.train("Karnataka", "Ragi")?;
//! println!("rmse {:.2}, mape {:.2}%", metrics.rmse, metrics.mape);
//!
//! // Forecast from a given date
//! let prediction = service.predict("Karnataka", Some("Mysuru"), "Ragi", Some("2024-01-13"))?;
//! for point in &prediction.forecasts {
//!     println!("{} {:.2}", point.date, point.price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aligner;
pub mod config;
pub mod data;
pub mod dates;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod series;
pub mod store;

// Re-export commonly used types
pub use crate::aligner::AlignedForecast;
pub use crate::config::ForecastConfig;
pub use crate::data::{DataLoader, IngestReport, Observation, RawRecord, SeriesKey};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{CancelToken, SequenceModel, TrainedSequenceModel};
pub use crate::pipeline::{ForecastService, Prediction, TrainOutcome};
pub use crate::registry::{ModelArtifact, ModelMetrics, ModelRegistry};
pub use crate::series::{PricePoint, Series};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
