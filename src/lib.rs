//! # Agri Forecast Workspace
//!
//! Facade over the workspace crates:
//!
//! - [`price_math`]: interpolation, standard scaling, windowing and error metrics
//! - [`agri_forecast`]: ingest, per-key training and anchor-date forecasting
//!
//! ## Example
//!
//! ```
//! use agri_forecast_workspace::price_math::{make_windows, StandardScaler};
//!
//! let prices: Vec<f64> = (0..40).map(|i| 1000.0 + i as f64).collect();
//! let scaler = StandardScaler::fit(&prices).unwrap();
//! let windows = make_windows(&scaler.transform(&prices), 28, 7);
//! assert_eq!(windows.len(), 6);
//! ```

pub use agri_forecast;
pub use price_math;

pub use agri_forecast::{ForecastConfig, ForecastService, Prediction};
