//! Dense daily price series
//!
//! Observations for one key are averaged per calendar day and laid on a
//! contiguous daily grid from the first to the last observed date. Days
//! without observations are linearly interpolated between their nearest
//! observed neighbours.

use crate::data::{Observation, SeriesKey};
use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use price_math::interpolate::fill_gaps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A dated price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Gap-free daily series: strictly increasing, contiguous dates, never empty
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    start: NaiveDate,
    prices: Vec<f64>,
}

impl Series {
    /// Build the daily series of `key` from its observations
    pub fn build(key: &SeriesKey, observations: &[Observation]) -> Result<Self> {
        let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for obs in observations {
            let entry = by_date.entry(obs.date).or_insert((0.0, 0));
            entry.0 += obs.price;
            entry.1 += 1;
        }

        let (start, end) = match (by_date.keys().next(), by_date.keys().next_back()) {
            (Some(&start), Some(&end)) => (start, end),
            _ => {
                return Err(ForecastError::InsufficientData {
                    key: key.to_string(),
                    required: 1,
                    available: 0,
                })
            }
        };

        let days = (end - start).num_days() as usize + 1;
        let mut grid: Vec<Option<f64>> = vec![None; days];
        for (date, (sum, count)) in &by_date {
            let idx = (*date - start).num_days() as usize;
            grid[idx] = Some(sum / *count as f64);
        }

        let prices = fill_gaps(&grid)?;
        debug!(
            key = %key,
            observed_days = by_date.len(),
            days,
            start = %start,
            end = %end,
            "Built daily series"
        );

        Ok(Self { start, prices })
    }

    /// Series from already dense daily prices starting at `start`
    pub fn from_prices(start: NaiveDate, prices: Vec<f64>) -> Result<Self> {
        if prices.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "A series needs at least one price".to_string(),
            ));
        }
        Ok(Self { start, prices })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// Last date of history
    pub fn end_date(&self) -> NaiveDate {
        self.start + Days::new(self.prices.len() as u64 - 1)
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Dated view of the series
    pub fn points(&self) -> Vec<PricePoint> {
        self.prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                date: self.start + Days::new(i as u64),
                price,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, price: f64) -> Observation {
        Observation {
            date,
            region: "Gujarat".to_string(),
            subregion: None,
            commodity: "Cotton".to_string(),
            price,
        }
    }

    fn key() -> SeriesKey {
        SeriesKey::new("Gujarat", "Cotton")
    }

    #[test]
    fn missing_day_interpolates_to_midpoint() {
        let series = Series::build(
            &key(),
            &[obs(ymd(2024, 3, 1), 6000.0), obs(ymd(2024, 3, 3), 6100.0)],
        )
        .unwrap();

        assert_eq!(series.len(), 3);
        assert_relative_eq!(series.prices()[1], 6050.0);
        assert_eq!(series.points()[1].date, ymd(2024, 3, 2));
    }

    #[test]
    fn duplicate_dates_are_averaged_and_input_order_ignored() {
        let series = Series::build(
            &key(),
            &[
                obs(ymd(2024, 3, 2), 30.0),
                obs(ymd(2024, 3, 1), 10.0),
                obs(ymd(2024, 3, 1), 20.0),
            ],
        )
        .unwrap();

        assert_eq!(series.start_date(), ymd(2024, 3, 1));
        assert_eq!(series.end_date(), ymd(2024, 3, 2));
        assert_eq!(series.prices(), &[15.0, 30.0]);
    }

    #[test]
    fn dates_are_contiguous_across_months() {
        let series = Series::build(
            &key(),
            &[obs(ymd(2024, 2, 27), 1.0), obs(ymd(2024, 3, 2), 5.0)],
        )
        .unwrap();

        // 2024 is a leap year: 27, 28, 29 Feb, 1, 2 Mar
        assert_eq!(series.len(), 5);
        let points = series.points();
        for pair in points.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, chrono::Duration::days(1));
        }
        assert_eq!(series.prices(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn single_observation_builds_one_day() {
        let series = Series::build(&key(), &[obs(ymd(2024, 1, 10), 42.0)]).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.end_date(), ymd(2024, 1, 10));
    }

    #[test]
    fn empty_input_is_insufficient() {
        assert!(matches!(
            Series::build(&key(), &[]),
            Err(ForecastError::InsufficientData { available: 0, .. })
        ));
    }
}
