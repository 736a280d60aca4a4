//! Trained model artifacts, one per (region, commodity) key
//!
//! An artifact bundles the fitted scaler, the trained model and its
//! evaluation metrics in a single JSON file, so all three are replaced
//! together. Writes go to a temporary file in the same directory and are
//! renamed into place while holding the key's lock: readers see the old or
//! the new artifact, never a partial one, and concurrent trainers of one
//! key resolve to last-writer-wins.

use crate::data::SeriesKey;
use crate::error::{ForecastError, Result};
use crate::models::{CancelToken, FitSummary, SequenceModel, TrainedSequenceModel};
use crate::store::write_atomically;
use chrono::{DateTime, Utc};
use price_math::metrics::accuracy;
use price_math::{StandardScaler, Window};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One window in this many, taken from the end, is held out for evaluation
const HOLDOUT_DIVISOR: usize = 10;

/// Post-training accuracy, in original price units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub rmse: f64,
    /// Percent
    pub mape: f64,
}

/// Everything inference needs for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    pub key: SeriesKey,
    pub scaler: StandardScaler,
    pub model: M,
    pub metrics: ModelMetrics,
    pub seq_len: usize,
    pub horizon: usize,
    /// Windows used for fitting
    pub train_samples: usize,
    /// Windows held out for evaluation
    pub holdout_samples: usize,
    pub epochs_run: usize,
    pub trained_at: DateTime<Utc>,
}

/// Split windows into a leading fit set and a trailing holdout, keeping order
fn split_holdout(windows: &[Window]) -> (&[Window], &[Window]) {
    if windows.len() < 2 {
        return (windows, &[]);
    }
    let holdout = windows.len().div_ceil(HOLDOUT_DIVISOR).min(windows.len() - 1);
    windows.split_at(windows.len() - holdout)
}

/// Score `model` on `holdout` after mapping both sides back to prices
fn evaluate<M: TrainedSequenceModel>(
    model: &M,
    scaler: &StandardScaler,
    holdout: &[Window],
) -> Result<ModelMetrics> {
    let mut predicted = Vec::with_capacity(holdout.len() * model.horizon());
    let mut actual = Vec::with_capacity(holdout.len() * model.horizon());
    for window in holdout {
        predicted.extend(scaler.inverse(&model.predict(&window.input)?));
        actual.extend(scaler.inverse(&window.target));
    }

    let acc = accuracy(&actual, &predicted)?;
    Ok(ModelMetrics {
        rmse: acc.rmse,
        mape: acc.mape,
    })
}

/// Directory of model artifacts with per-key write serialization
#[derive(Debug)]
pub struct ModelRegistry {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ModelRegistry {
    /// Open (and create if needed) a registry rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the artifact for `key`
    pub fn artifact_path(&self, key: &SeriesKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    fn key_lock(&self, key: &SeriesKey) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.file_stem()).or_default().clone()
    }

    pub fn exists(&self, key: &SeriesKey) -> bool {
        self.artifact_path(key).is_file()
    }

    /// Fit `spec` on `windows`, evaluate on the trailing slice and persist.
    ///
    /// Fails with `InsufficientSamples` below `min_samples` windows. Any
    /// failure leaves the previously persisted artifact untouched.
    pub fn train<S>(
        &self,
        key: &SeriesKey,
        spec: &S,
        scaler: StandardScaler,
        windows: &[Window],
        min_samples: usize,
        cancel: &CancelToken,
    ) -> Result<ModelArtifact<S::Trained>>
    where
        S: SequenceModel,
        S::Trained: Serialize,
    {
        let required = min_samples.max(2);
        if windows.len() < required {
            return Err(ForecastError::InsufficientSamples {
                key: key.to_string(),
                required,
                available: windows.len(),
            });
        }

        let (fit_set, holdout) = split_holdout(windows);
        info!(
            key = %key,
            model = spec.name(),
            fit_windows = fit_set.len(),
            holdout_windows = holdout.len(),
            "Training model"
        );

        let (model, summary): (S::Trained, FitSummary) = match spec.fit(fit_set, cancel) {
            Ok(fitted) => fitted,
            Err(err) => {
                warn!(key = %key, error = %err, "Training failed, keeping previous artifact");
                return Err(err);
            }
        };
        let metrics = evaluate(&model, &scaler, holdout)?;

        let artifact = ModelArtifact {
            key: key.clone(),
            scaler,
            seq_len: model.seq_len(),
            horizon: model.horizon(),
            model,
            metrics,
            train_samples: fit_set.len(),
            holdout_samples: holdout.len(),
            epochs_run: summary.epochs_run,
            trained_at: Utc::now(),
        };
        self.save(&artifact)?;

        info!(
            key = %key,
            rmse = metrics.rmse,
            mape = metrics.mape,
            epochs = summary.epochs_run,
            best_epoch = summary.best_epoch,
            "Saved model"
        );
        Ok(artifact)
    }

    /// Atomically replace the artifact of `artifact.key`
    pub fn save<M: Serialize>(&self, artifact: &ModelArtifact<M>) -> Result<()> {
        let json = serde_json::to_vec(artifact)?;
        let lock = self.key_lock(&artifact.key);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        write_atomically(&self.artifact_path(&artifact.key), &json)
    }

    /// Load the artifact of `key`, or `ModelNotFound`.
    ///
    /// A file whose recorded key differs from `key` is treated as absent.
    pub fn load<M: DeserializeOwned>(&self, key: &SeriesKey) -> Result<ModelArtifact<M>> {
        let not_found = || ForecastError::ModelNotFound {
            key: key.to_string(),
        };
        let bytes = match std::fs::read(self.artifact_path(key)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };

        let artifact: ModelArtifact<M> = serde_json::from_slice(&bytes)?;
        if !artifact.key.same_as(key) {
            warn!(requested = %key, stored = %artifact.key, "Artifact belongs to another key");
            return Err(not_found());
        }
        Ok(artifact)
    }
}
