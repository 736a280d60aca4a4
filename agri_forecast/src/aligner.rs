//! Anchor-date forecast alignment
//!
//! Recursive generation always starts on the day after the last historical
//! date, whatever date was requested. The requested window is then sliced
//! out of that one forward path. Two queries against the same history
//! therefore agree on every date they both cover.

use crate::data::SeriesKey;
use crate::error::{ForecastError, Result};
use crate::models::TrainedSequenceModel;
use crate::series::{PricePoint, Series};
use chrono::{Days, NaiveDate};
use price_math::StandardScaler;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Furthest a requested start may lie beyond the anchor date
pub const MAX_LEAD_DAYS: i64 = 366;

/// Reported prices are rounded to this many decimals
const PRICE_DECIMALS: i32 = 2;

fn round_price(price: f64) -> f64 {
    let factor = 10f64.powi(PRICE_DECIMALS);
    (price * factor).round() / factor
}

/// A forecast window cut from the anchored forward path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedForecast {
    /// First day after history; generation always starts here
    pub anchor_date: NaiveDate,
    /// First day of the returned window
    pub start_date: NaiveDate,
    /// Price on `start_date`
    pub representative_price: f64,
    /// `horizon` consecutive days from `start_date`
    pub forecasts: Vec<PricePoint>,
    /// The requested date lay inside history and was moved forward
    pub clamped: bool,
}

/// Forecast `horizon` days of the series of `key`, aligned to its anchor date.
///
/// `requested` before the anchor is clamped to the anchor; the result is
/// flagged so callers can tell the user.
pub fn forecast<M>(
    key: &SeriesKey,
    series: &Series,
    model: &M,
    scaler: &StandardScaler,
    seq_len: usize,
    horizon: usize,
    requested: Option<NaiveDate>,
) -> Result<AlignedForecast>
where
    M: TrainedSequenceModel + ?Sized,
{
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast horizon must be positive".to_string(),
        ));
    }
    if seq_len == 0 || model.seq_len() != seq_len {
        return Err(ForecastError::InvalidParameter(format!(
            "Model expects {} inputs, asked to align with {}",
            model.seq_len(),
            seq_len
        )));
    }
    if series.len() < seq_len {
        return Err(ForecastError::InsufficientHistory {
            key: key.to_string(),
            required: seq_len,
            available: series.len(),
        });
    }

    let hist_end = series.end_date();
    let anchor_date = hist_end + Days::new(1);

    let clamped = requested.map_or(false, |date| date < anchor_date);
    let start_date = requested.map_or(anchor_date, |date| date.max(anchor_date));
    let lead = (start_date - anchor_date).num_days();
    if lead > MAX_LEAD_DAYS {
        return Err(ForecastError::InvalidParameter(format!(
            "Requested start {} is more than {} days past {}",
            start_date, MAX_LEAD_DAYS, anchor_date
        )));
    }
    if clamped {
        warn!(
            key = %key,
            requested = ?requested,
            anchor = %anchor_date,
            "Requested date lies inside history, forecasting from the anchor date"
        );
    }

    let start_idx = lead as usize;
    let total_days_needed = start_idx + horizon;
    debug!(
        key = %key,
        hist_end = %hist_end,
        anchor = %anchor_date,
        requested = ?requested,
        start = %start_date,
        total_days_needed,
        start_idx,
        horizon,
        "Aligning forecast"
    );

    let history = series.prices();
    let mut window: VecDeque<f64> = scaler
        .transform(&history[history.len() - seq_len..])
        .into();

    let mut path = Vec::with_capacity(total_days_needed);
    for step in 0..total_days_needed {
        let next = model.predict_step(window.make_contiguous())?;
        window.pop_front();
        window.push_back(next);

        path.push(PricePoint {
            date: anchor_date + Days::new(step as u64),
            price: round_price(scaler.inverse_value(next)),
        });
    }

    let forecasts = path.split_off(start_idx);
    Ok(AlignedForecast {
        anchor_date,
        start_date,
        representative_price: forecasts[0].price,
        forecasts,
        clamped,
    })
}
