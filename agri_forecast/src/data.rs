//! Price observations and raw tabular input
//!
//! Raw rows arrive as loosely typed text (from a CSV export or from the
//! calling service). [`clean_records`] turns them into [`Observation`]s,
//! dropping malformed rows one at a time and counting what it dropped.

use crate::dates::parse_date;
use crate::error::Result;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Identity of one independent series, scaler and model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub region: String,
    pub commodity: String,
}

impl SeriesKey {
    pub fn new(region: impl Into<String>, commodity: impl Into<String>) -> Self {
        Self {
            region: region.into().trim().to_string(),
            commodity: commodity.into().trim().to_string(),
        }
    }

    /// Whether an observation belongs to this key (commodity case-insensitive)
    pub fn matches(&self, obs: &Observation) -> bool {
        obs.region == self.region && obs.commodity.eq_ignore_ascii_case(&self.commodity)
    }

    /// Same key as `other`, with the commodity compared case-insensitively
    pub fn same_as(&self, other: &SeriesKey) -> bool {
        self.region == other.region && self.commodity.eq_ignore_ascii_case(&other.commodity)
    }

    /// File-name-safe stem used for persisted artifacts.
    ///
    /// Distinct keys (up to commodity case) always get distinct stems.
    pub fn file_stem(&self) -> String {
        format!(
            "{}__{}",
            escape(&self.region),
            escape(&self.commodity.to_ascii_lowercase())
        )
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.commodity)
    }
}

/// Keep ASCII letters, digits and `-`; every other byte becomes `_xx` (hex).
///
/// An escape is always `_` plus two hex digits, so the `__` separator in
/// [`SeriesKey::file_stem`] cannot be produced by either part.
fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

/// One daily price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub region: String,
    pub subregion: Option<String>,
    pub commodity: String,
    pub price: f64,
}

/// An unvalidated input row; every field may be missing or malformed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: Option<String>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub commodity: Option<String>,
    pub price: Option<String>,
}

impl RawRecord {
    /// Validate the row; `None` means it must be dropped
    pub fn to_observation(&self) -> Option<Observation> {
        let date = parse_date(non_blank(&self.date)?).ok()?;
        let region = non_blank(&self.region)?.to_string();
        let commodity = non_blank(&self.commodity)?.to_string();
        let price: f64 = non_blank(&self.price)?.parse().ok()?;
        if !price.is_finite() {
            return None;
        }

        Some(Observation {
            date,
            region,
            subregion: non_blank(&self.subregion).map(str::to_string),
            commodity,
            price,
        })
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Inclusive date range kept on ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    /// The trailing `years` (365-day years) ending on `today`
    pub fn trailing_years(today: NaiveDate, years: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(365 * u64::from(years)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Row accounting for one ingest batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Rows received
    pub rows_read: usize,
    /// Rows dropped for a missing field, bad date or non-numeric price
    pub rows_dropped: usize,
    /// Valid rows outside the trailing history window
    pub rows_out_of_window: usize,
    /// Rows written to the observation store
    pub rows_persisted: usize,
    /// Number of (region, subregion) rankings recomputed
    pub rankings: usize,
}

/// Validate rows and keep the ones inside `window`
pub fn clean_records(
    records: &[RawRecord],
    window: HistoryWindow,
) -> (Vec<Observation>, IngestReport) {
    let mut report = IngestReport {
        rows_read: records.len(),
        ..IngestReport::default()
    };
    let mut observations = Vec::with_capacity(records.len());

    for record in records {
        match record.to_observation() {
            None => report.rows_dropped += 1,
            Some(obs) if !window.contains(obs.date) => report.rows_out_of_window += 1,
            Some(obs) => observations.push(obs),
        }
    }

    info!(
        rows_read = report.rows_read,
        dropped = report.rows_dropped,
        out_of_window = report.rows_out_of_window,
        kept = observations.len(),
        start = %window.start,
        end = %window.end,
        "Cleaned ingest batch"
    );

    (observations, report)
}

/// Column of a raw export that feeds a [`RawRecord`] field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Region,
    Subregion,
    Commodity,
    Price,
}

impl Field {
    /// Recognise a header, including the market-export spellings
    fn from_header(header: &str) -> Option<Self> {
        let name = header.trim().to_lowercase();
        match name.as_str() {
            "date" | "arrival_date" => Some(Field::Date),
            "region" | "state" => Some(Field::Region),
            "subregion" | "district" | "market" => Some(Field::Subregion),
            "commodity" | "crop" => Some(Field::Commodity),
            "price" | "modal price" | "modal_price" => Some(Field::Price),
            _ => None,
        }
    }
}

/// Reader for tabular price exports
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load raw rows from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load raw rows from any CSV source with a header line.
    ///
    /// Unknown columns are ignored. Short rows yield missing fields rather
    /// than errors, so they are dropped later at row granularity.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<Option<Field>> = csv_reader
            .headers()?
            .iter()
            .map(Field::from_header)
            .collect();

        for required in [Field::Date, Field::Region, Field::Commodity, Field::Price] {
            if !columns.contains(&Some(required)) {
                warn!(column = ?required, "Required column missing from input");
            }
        }

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let mut record = RawRecord::default();
            for (value, field) in row.iter().zip(columns.iter()) {
                let slot = match field {
                    Some(Field::Date) => &mut record.date,
                    Some(Field::Region) => &mut record.region,
                    Some(Field::Subregion) => &mut record.subregion,
                    Some(Field::Commodity) => &mut record.commodity,
                    Some(Field::Price) => &mut record.price,
                    None => continue,
                };
                *slot = Some(value.to_string());
            }
            records.push(record);
        }

        Ok(records)
    }
}
