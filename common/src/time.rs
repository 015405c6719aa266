//! Date utilities and constants for fxscrape.

use chrono::{Duration, NaiveDate, Utc};

/// Timing and batch-size constants.
pub mod constants {
    use super::Duration;

    /// Per-unit upstream fetch timeout (60 seconds).
    pub fn fetch_timeout() -> Duration {
        Duration::seconds(60)
    }

    /// How far behind today the currency tables are complete (2 days).
    pub fn catalogue_lag() -> Duration {
        Duration::hours(48)
    }

    /// Longest time series accepted in one request (366 days).
    pub const MAX_TIMESERIES_DAYS: usize = 366;

    /// Most symbols fetched one by one in a single request.
    pub const MAX_SYMBOLS: usize = 64;
}

/// Calendar date format used on the wire and in upstream URLs.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get today's date in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// The most recent day whose currency table is expected to be published.
pub fn catalogue_date(today: NaiveDate) -> NaiveDate {
    today - constants::catalogue_lag()
}

/// Every calendar day in `[start, end]`, ascending.
///
/// Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Number of days in `[start, end]`, zero when the range is inverted.
pub fn span_days(start: NaiveDate, end: NaiveDate) -> usize {
    if start > end {
        0
    } else {
        (end - start).num_days() as usize + 1
    }
}
