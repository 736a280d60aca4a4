//! Calendar date parsing for requested forecast dates and ingested rows

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;

/// Fallback formats, tried in order after ISO `YYYY-MM-DD`.
///
/// Day-first layouts win over the US month-first layout when a date is
/// ambiguous (e.g. `03/04/2024` is 3 April).
const FALLBACK_FORMATS: [&str; 3] = ["%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y"];

/// Parse a calendar date, accepting ISO first and then the fallback layouts
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ForecastError::InvalidDate(raw.to_string()))
}

/// Parse an optional requested date; blank input means "no date"
pub fn parse_requested_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}
