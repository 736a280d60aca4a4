//! The three operations exposed to a calling service: ingest, train, predict
//!
//! [`ForecastService`] is stateless between calls. Everything it knows lives
//! in the observation store and the model registry on disk, so several
//! services may share the same directories.

use crate::aligner::{self, AlignedForecast};
use crate::config::ForecastConfig;
use crate::data::{clean_records, DataLoader, HistoryWindow, IngestReport, RawRecord, SeriesKey};
use crate::dates::parse_requested_date;
use crate::error::{ForecastError, Result};
use crate::models::{CancelToken, LinearSequenceModel, TrainedLinearModel};
use crate::registry::{ModelArtifact, ModelMetrics, ModelRegistry};
use crate::series::{PricePoint, Series};
use crate::store::{ranking_key, ObservationStore};
use chrono::{NaiveDate, Utc};
use price_math::{make_windows, StandardScaler};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Artifact type written by [`ForecastService::train`]
pub type LinearArtifact = ModelArtifact<TrainedLinearModel>;

/// Answer to a predict call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub region: String,
    pub commodity: String,
    /// Subregion whose observations built the series; `None` when the whole
    /// region was pooled
    pub subregion: Option<String>,
    /// First day after the last historical date
    pub anchor_date: NaiveDate,
    pub start_date: NaiveDate,
    pub representative_price: f64,
    pub forecasts: Vec<PricePoint>,
    /// The requested date lay inside history and was moved to the anchor
    pub clamped: bool,
}

/// Outcome of training one key during [`ForecastService::train_all`]
#[derive(Debug)]
pub struct TrainOutcome {
    pub key: SeriesKey,
    pub result: Result<ModelMetrics>,
}

/// Ingest, train and predict over one data directory and one model directory
#[derive(Debug)]
pub struct ForecastService {
    config: ForecastConfig,
    store: ObservationStore,
    registry: ModelRegistry,
}

impl ForecastService {
    /// Open the service, creating its directories if needed
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let store = ObservationStore::open(&config.data_dir)?;
        let registry = ModelRegistry::open(&config.models_dir)?;
        Ok(Self {
            config,
            store,
            registry,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Clean, window and persist raw rows, keeping the trailing history
    /// ending today
    pub fn ingest(&self, records: &[RawRecord]) -> Result<IngestReport> {
        self.ingest_as_of(records, Utc::now().date_naive())
    }

    /// [`ingest`](Self::ingest) with an explicit "today"
    pub fn ingest_as_of(&self, records: &[RawRecord], today: NaiveDate) -> Result<IngestReport> {
        let window = HistoryWindow::trailing_years(today, self.config.history_years);
        let (observations, mut report) = clean_records(records, window);
        if observations.is_empty() {
            return Err(ForecastError::NoData(format!(
                "none of {} rows is valid and inside {}..={}",
                report.rows_read, window.start, window.end
            )));
        }

        let rankings = self.store.append(&observations, self.config.top_n)?;
        report.rows_persisted = observations.len();
        report.rankings = rankings.len();

        info!(
            persisted = report.rows_persisted,
            dropped = report.rows_dropped,
            rankings = report.rankings,
            "Ingest complete"
        );
        Ok(report)
    }

    /// Ingest a CSV export from disk
    pub fn ingest_csv<P: AsRef<Path>>(&self, path: P) -> Result<IngestReport> {
        let records = DataLoader::from_csv(path)?;
        self.ingest(&records)
    }

    /// Train and persist the model of one key
    pub fn train(&self, region: &str, commodity: &str) -> Result<ModelMetrics> {
        self.train_with_cancel(region, commodity, &CancelToken::new())
    }

    /// [`train`](Self::train), interruptible between epochs
    pub fn train_with_cancel(
        &self,
        region: &str,
        commodity: &str,
        cancel: &CancelToken,
    ) -> Result<ModelMetrics> {
        let key = SeriesKey::new(region, commodity);
        let observations = self.store.query(&key, None)?;
        let required = self.config.min_training_days();
        if observations.is_empty() {
            return Err(ForecastError::InsufficientData {
                key: key.to_string(),
                required,
                available: 0,
            });
        }

        let series = Series::build(&key, &observations)?;
        if series.len() < required {
            return Err(ForecastError::InsufficientData {
                key: key.to_string(),
                required,
                available: series.len(),
            });
        }

        let scaler = StandardScaler::fit(series.prices())?;
        let scaled = scaler.transform(series.prices());
        let windows = make_windows(&scaled, self.config.seq_len, self.config.horizon);

        let spec = LinearSequenceModel::new(self.config.seq_len, self.config.horizon)?
            .with_training(
                self.config.epochs,
                self.config.batch_size,
                self.config.learning_rate,
                self.config.patience,
            )?;

        let artifact = self.registry.train(
            &key,
            &spec,
            scaler,
            &windows,
            self.config.min_samples,
            cancel,
        )?;
        Ok(artifact.metrics)
    }

    /// Train every key in the store, one after the other
    pub fn train_all(&self) -> Result<Vec<TrainOutcome>> {
        let keys = self.store.keys()?;
        info!(keys = keys.len(), "Training all keys");

        let outcomes: Vec<TrainOutcome> = keys
            .into_iter()
            .map(|key| {
                let result = self.train(&key.region, &key.commodity);
                if let Err(err) = &result {
                    warn!(key = %key, error = %err, "Skipping key");
                }
                TrainOutcome { key, result }
            })
            .collect();

        let trained = outcomes.iter().filter(|o| o.result.is_ok()).count();
        info!(trained, failed = outcomes.len() - trained, "Finished training all keys");
        Ok(outcomes)
    }

    /// Forecast `horizon` days for a key.
    ///
    /// With a subregion, its observations are used when it has any; the
    /// whole region is pooled otherwise.
    ///
    /// # Errors
    ///
    /// - `InvalidDate` when `requested_date` cannot be parsed
    /// - `ModelNotFound` when the key was never trained
    /// - `InsufficientHistory` when the series is shorter than the model input
    /// - `InvalidParameter` when the requested date lies more than
    ///   [`MAX_LEAD_DAYS`](crate::aligner::MAX_LEAD_DAYS) days after the anchor date
    pub fn predict(
        &self,
        region: &str,
        subregion: Option<&str>,
        commodity: &str,
        requested_date: Option<&str>,
    ) -> Result<Prediction> {
        let requested = parse_requested_date(requested_date)?;
        let key = SeriesKey::new(region, commodity);
        let artifact: LinearArtifact = self.registry.load(&key)?;

        let subregion = subregion.map(str::trim).filter(|s| !s.is_empty());
        let (observations, used_subregion) = match subregion {
            Some(sub) => {
                let local = self.store.query(&key, Some(sub))?;
                if local.is_empty() {
                    info!(key = %key, subregion = sub, "No subregion data, pooling region");
                    (self.store.query(&key, None)?, None)
                } else {
                    (local, Some(sub.to_string()))
                }
            }
            None => (self.store.query(&key, None)?, None),
        };
        if observations.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                key: key.to_string(),
                required: artifact.seq_len,
                available: 0,
            });
        }

        let series = Series::build(&key, &observations)?;
        let AlignedForecast {
            anchor_date,
            start_date,
            representative_price,
            forecasts,
            clamped,
        } = aligner::forecast(
            &key,
            &series,
            &artifact.model,
            &artifact.scaler,
            artifact.seq_len,
            artifact.horizon,
            requested,
        )?;

        info!(key = %key, start = %start_date, days = forecasts.len(), "Served forecast");
        Ok(Prediction {
            region: key.region,
            commodity: key.commodity,
            subregion: used_subregion,
            anchor_date,
            start_date,
            representative_price,
            forecasts,
            clamped,
        })
    }

    /// Persisted top commodities of a (region, subregion), best first.
    ///
    /// An unranked (region, subregion) gets every ranked commodity instead,
    /// deduplicated and sorted by name.
    pub fn top_commodities(&self, region: &str, subregion: Option<&str>) -> Result<Vec<String>> {
        let region = region.trim();
        let subregion = subregion.map(str::trim).filter(|s| !s.is_empty());
        let mut rankings = self.store.load_rankings()?;

        if !region.is_empty() {
            if let Some(top) = rankings.swap_remove(&ranking_key(region, subregion)) {
                return Ok(top);
            }
        }

        let all: BTreeSet<String> = rankings.into_values().flatten().collect();
        Ok(all.into_iter().collect())
    }

    /// Metrics recorded when the key was last trained
    pub fn metrics(&self, key: &SeriesKey) -> Result<ModelMetrics> {
        let artifact: LinearArtifact = self.registry.load(key)?;
        Ok(artifact.metrics)
    }

    /// Full artifact of a key, for inspection
    pub fn artifact(&self, key: &SeriesKey) -> Result<LinearArtifact> {
        self.registry.load(key)
    }
}
