//! Pipeline configuration
//!
//! Every option has a default and can be overridden through `KM_*`
//! environment variables. The struct also (de)serializes so a caller can
//! keep it in a file of its own.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::env::{self, VarError};
use std::path::PathBuf;
use std::str::FromStr;

/// Options recognised by ingestion, training and prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Trailing window of history kept on ingest, in years
    #[serde(default = "default_history_years")]
    pub history_years: u32,
    /// Number of past days fed to the model
    #[serde(default = "default_seq_len")]
    pub seq_len: usize,
    /// Number of days returned by one forecast
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Maximum training passes over the windows
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Windows per gradient step
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Epochs without improvement before training stops
    #[serde(default = "default_patience")]
    pub patience: usize,
    /// Minimum number of windows required to train
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Commodities kept per (region, subregion) ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history_years: default_history_years(),
            seq_len: default_seq_len(),
            horizon: default_horizon(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            patience: default_patience(),
            min_samples: default_min_samples(),
            top_n: default_top_n(),
            data_dir: default_data_dir(),
            models_dir: default_models_dir(),
        }
    }
}

fn default_history_years() -> u32 {
    4
}
fn default_seq_len() -> usize {
    28
}
fn default_horizon() -> usize {
    7
}
fn default_epochs() -> usize {
    40
}
fn default_batch_size() -> usize {
    64
}
fn default_learning_rate() -> f64 {
    0.01
}
fn default_patience() -> usize {
    6
}
fn default_min_samples() -> usize {
    50
}
fn default_top_n() -> usize {
    12
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

/// Parse `name` into `target` when the variable is set
fn override_from_env<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    match env::var(name) {
        Ok(raw) => {
            *target = raw.trim().parse().map_err(|_| {
                ForecastError::Config(format!("{name} has an unparseable value: {raw:?}"))
            })?;
            Ok(())
        }
        Err(VarError::NotPresent) => Ok(()),
        Err(VarError::NotUnicode(raw)) => Err(ForecastError::Config(format!(
            "{name} is not valid UTF-8: {raw:?}"
        ))),
    }
}

impl ForecastConfig {
    /// Defaults overridden by any `KM_*` variables present in the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        override_from_env("KM_YEARS", &mut config.history_years)?;
        override_from_env("KM_SEQ_LEN", &mut config.seq_len)?;
        override_from_env("KM_PRED_HORIZON", &mut config.horizon)?;
        override_from_env("KM_EPOCHS", &mut config.epochs)?;
        override_from_env("KM_BATCH", &mut config.batch_size)?;
        override_from_env("KM_LEARNING_RATE", &mut config.learning_rate)?;
        override_from_env("KM_PATIENCE", &mut config.patience)?;
        override_from_env("KM_MIN_SAMPLES", &mut config.min_samples)?;
        override_from_env("KM_TOP_N", &mut config.top_n)?;
        override_from_env("KM_DATA_DIR", &mut config.data_dir)?;
        override_from_env("KM_MODELS_DIR", &mut config.models_dir)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("history_years", self.history_years as usize),
            ("seq_len", self.seq_len),
            ("horizon", self.horizon),
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ForecastError::Config(format!("{name} must be positive")));
            }
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::Config(
                "learning_rate must be a positive number".to_string(),
            ));
        }
        Ok(())
    }

    /// Shortest daily series a key needs before training is attempted
    pub fn min_training_days(&self) -> usize {
        self.seq_len + self.horizon + 10
    }
}
