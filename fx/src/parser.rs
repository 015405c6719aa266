//! Typed values from raw page text.
//!
//! All locale and format handling of upstream text lives here. Functions are
//! pure: they never fetch and never touch scheduler state.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use fxscrape_common::{SymbolList, UnitFailure};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Marker preceding the "last updated" phrase on the converter page.
pub const UPDATED_MARKER: &str = "updated ";

/// Errors produced while turning raw text into values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Text is not a finite decimal number.
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    /// Expected marker text is absent.
    #[error("Missing marker {0:?}")]
    MissingMarker(&'static str),

    /// Timestamp tokens could not be assembled into a date-time.
    #[error("Malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// A table yielded no usable rows.
    #[error("No usable rows")]
    NoRows,

    /// The extraction does not carry the fragments this kind needs.
    #[error("Extraction does not match expected value kind")]
    KindMismatch,
}

impl From<ParseError> for UnitFailure {
    fn from(err: ParseError) -> Self {
        UnitFailure::Parse(err.to_string())
    }
}

/// One row of the upstream currency table, still as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub code: String,
    pub name: String,
    pub rate: String,
}

/// Text fragments pulled from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawExtraction {
    /// Converter page: the large result text and the "last updated" sub-text.
    BigRate {
        big_rate: String,
        updated: Option<String>,
    },
    /// Currency table rows.
    TableRows(Vec<RawRow>),
}

/// Which typed value a unit expects from its extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Rate,
    RateWithTimestamp,
    RateTable(SymbolList),
    Catalogue,
}

/// Typed outcome of parsing one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedValue {
    Rate(f64),
    /// The timestamp is `None` when only that field failed to parse.
    RateWithTimestamp { rate: f64, timestamp: Option<i64> },
    RateTable(BTreeMap<String, f64>),
    Catalogue(BTreeMap<String, String>),
}

/// Parse a raw extraction into the requested kind of value.
pub fn parse(raw: &RawExtraction, kind: &ValueKind) -> Result<ParsedValue, ParseError> {
    match (raw, kind) {
        (RawExtraction::BigRate { big_rate, .. }, ValueKind::Rate) => {
            parse_big_rate(big_rate).map(ParsedValue::Rate)
        }
        (RawExtraction::BigRate { big_rate, updated }, ValueKind::RateWithTimestamp) => {
            let rate = parse_big_rate(big_rate)?;
            // An unreadable "updated" phrase costs only the timestamp, not the rate.
            let timestamp = updated.as_deref().and_then(|text| {
                parse_updated_timestamp(text)
                    .map_err(|error| warn!(raw = text, error = %error, "Dropping unparsable timestamp"))
                    .ok()
            });
            Ok(ParsedValue::RateWithTimestamp { rate, timestamp })
        }
        (RawExtraction::TableRows(rows), ValueKind::RateTable(symbols)) => {
            parse_rate_table(rows, symbols).map(ParsedValue::RateTable)
        }
        (RawExtraction::TableRows(rows), ValueKind::Catalogue) => {
            parse_catalogue(rows).map(ParsedValue::Catalogue)
        }
        _ => Err(ParseError::KindMismatch),
    }
}

/// Parse a numeric rate, dropping comma grouping separators.
pub fn parse_rate(text: &str) -> Result<f64, ParseError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidNumber(text.to_string())),
    }
}

/// Parse the converter's big rate text, e.g. `"1,234.56 Japanese Yen"`.
pub fn parse_big_rate(text: &str) -> Result<f64, ParseError> {
    let first = text.split_whitespace().next().unwrap_or_default();
    parse_rate(first)
}

/// Normalize a day-of-month token to two digits.
///
/// Accepts `"5"`, `"05"`, `"5,"` and a day glued to trailing text such as
/// `"5,14:32"`; only the leading digits are considered.
pub fn normalize_day_token(token: &str) -> Option<String> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    let day: u32 = digits.parse().ok()?;
    if (1..=31).contains(&day) {
        Some(format!("{day:02}"))
    } else {
        None
    }
}

/// Parse the "last updated" phrase into a Unix timestamp (UTC).
///
/// The phrase looks like `"Last updated Jan 5, 2024, 14:32 UTC"`; day
/// padding and separators vary between renders.
pub fn parse_updated_timestamp(text: &str) -> Result<i64, ParseError> {
    let start = text
        .find(UPDATED_MARKER)
        .ok_or(ParseError::MissingMarker(UPDATED_MARKER))?;
    let rest = &text[start + UPDATED_MARKER.len()..];
    let malformed = || ParseError::MalformedTimestamp(rest.to_string());

    let mut tokens = rest.split_whitespace();
    let month: String = tokens
        .next()
        .ok_or_else(malformed)?
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if month.len() < 3 {
        return Err(malformed());
    }

    let day_token = tokens.next().ok_or_else(malformed)?;
    let day = normalize_day_token(day_token).ok_or_else(malformed)?;

    // A time glued to the day ("5,14:32") stands in for a separate token.
    let glued_time = day_token
        .split_once(|c: char| !c.is_ascii_digit())
        .map(|(_, tail)| tail.trim_start_matches(',').to_string())
        .filter(|tail| tail.contains(':'));

    let year: String = tokens
        .next()
        .ok_or_else(malformed)?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if year.len() != 4 {
        return Err(malformed());
    }

    let time_token = match glued_time {
        Some(time) => time,
        None => tokens.next().ok_or_else(malformed)?.to_string(),
    };
    let mut clock = time_token.trim_end_matches(',').split(':');
    let hour = clock.next().ok_or_else(malformed)?;
    let minute: String = clock
        .next()
        .ok_or_else(malformed)?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let composed = format!("{year}-{}-{day} {hour}:{minute}", &month[..3]);
    NaiveDateTime::parse_from_str(&composed, "%Y-%b-%d %H:%M")
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|_| ParseError::MalformedTimestamp(composed))
}

/// Rates for the requested symbols; every row when `symbols` is empty.
///
/// Rows whose rate does not parse are skipped.
pub fn parse_rate_table(
    rows: &[RawRow],
    symbols: &SymbolList,
) -> Result<BTreeMap<String, f64>, ParseError> {
    let mut rates = BTreeMap::new();
    for row in rows {
        let code = row.code.trim();
        if code.is_empty() || (!symbols.is_empty() && !symbols.contains(code)) {
            continue;
        }
        if let Ok(rate) = parse_rate(&row.rate) {
            rates.insert(code.to_string(), rate);
        }
    }
    if rates.is_empty() {
        return Err(ParseError::NoRows);
    }
    Ok(rates)
}

/// Code to display-name catalogue. Empty codes are skipped; for repeated
/// codes the last row wins.
pub fn parse_catalogue(rows: &[RawRow]) -> Result<BTreeMap<String, String>, ParseError> {
    let mut catalogue = BTreeMap::new();
    for row in rows {
        let code = row.code.trim();
        if code.is_empty() {
            continue;
        }
        catalogue.insert(code.to_string(), row.name.trim().to_string());
    }
    if catalogue.is_empty() {
        return Err(ParseError::NoRows);
    }
    Ok(catalogue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(code: &str, name: &str, rate: &str) -> RawRow {
        RawRow {
            code: code.to_string(),
            name: name.to_string(),
            rate: rate.to_string(),
        }
    }

    #[test]
    fn test_parse_rate_strips_grouping() {
        assert_eq!(parse_rate("1,234.5").unwrap(), 1234.5);
        assert_eq!(parse_rate(" 0.92 ").unwrap(), 0.92);
        assert_eq!(parse_rate("1,000,000").unwrap(), 1_000_000.0);
    }

    #[test]
    fn test_parse_rate_rejects_garbage() {
        assert!(matches!(parse_rate(""), Err(ParseError::InvalidNumber(_))));
        assert!(matches!(parse_rate("n/a"), Err(ParseError::InvalidNumber(_))));
        assert!(matches!(parse_rate("inf"), Err(ParseError::InvalidNumber(_))));
        assert!(matches!(parse_rate("NaN"), Err(ParseError::InvalidNumber(_))));
    }

    #[test]
    fn test_parse_big_rate_takes_first_token() {
        assert_eq!(parse_big_rate("148.2301 Japanese Yen").unwrap(), 148.2301);
        assert_eq!(parse_big_rate("1,480.5 Japanese Yen").unwrap(), 1480.5);
        assert!(parse_big_rate("   ").is_err());
    }

    #[test]
    fn test_day_token_normalization() {
        assert_eq!(normalize_day_token("5").as_deref(), Some("05"));
        assert_eq!(normalize_day_token("05").as_deref(), Some("05"));
        assert_eq!(normalize_day_token("5,").as_deref(), Some("05"));
        assert_eq!(normalize_day_token("17,14:32").as_deref(), Some("17"));
        assert_eq!(normalize_day_token("0"), None);
        assert_eq!(normalize_day_token("32"), None);
        assert_eq!(normalize_day_token("123"), None);
        assert_eq!(normalize_day_token("x5"), None);
    }

    #[test]
    fn test_padded_and_unpadded_day_give_same_timestamp() {
        let unpadded = parse_updated_timestamp("updated Jan 5 2024 14:32").unwrap();
        let padded = parse_updated_timestamp("updated Jan 05 2024 14:32").unwrap();
        assert_eq!(unpadded, padded);
        // 2024-01-05T14:32:00Z
        assert_eq!(unpadded, 1_704_465_120);
    }

    #[test]
    fn test_timestamp_with_commas_and_suffix() {
        let ts = parse_updated_timestamp("Mid-market rate, last updated Jan 5, 2024, 14:32 UTC")
            .unwrap();
        assert_eq!(ts, 1_704_465_120);
    }

    #[test]
    fn test_timestamp_with_time_glued_to_day() {
        let ts = parse_updated_timestamp("updated Jan 5,14:32 2024").unwrap();
        assert_eq!(ts, 1_704_465_120);
    }

    #[test]
    fn test_timestamp_failures() {
        assert_eq!(
            parse_updated_timestamp("Jan 5 2024 14:32"),
            Err(ParseError::MissingMarker(UPDATED_MARKER))
        );
        assert!(matches!(
            parse_updated_timestamp("updated Jan"),
            Err(ParseError::MalformedTimestamp(_))
        ));
        assert!(matches!(
            parse_updated_timestamp("updated Foo 5 2024 14:32"),
            Err(ParseError::MalformedTimestamp(_))
        ));
        assert!(matches!(
            parse_updated_timestamp("updated Jan 5 24 14:32"),
            Err(ParseError::MalformedTimestamp(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_keeps_rate() {
        let raw = RawExtraction::BigRate {
            big_rate: "0.92 Euros".to_string(),
            updated: Some("updated sometime".to_string()),
        };
        let value = parse(&raw, &ValueKind::RateWithTimestamp).unwrap();
        assert_eq!(
            value,
            ParsedValue::RateWithTimestamp {
                rate: 0.92,
                timestamp: None
            }
        );
    }

    #[test]
    fn test_rate_table_filters_symbols() {
        let rows = vec![
            row("EUR", "Euro", "0.92"),
            row("JPY", "Japanese Yen", "148.23"),
            row("GBP", "British Pound", "0.79"),
        ];
        let rates = parse_rate_table(&rows, &SymbolList::parse("EUR,GBP,CHF").unwrap()).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates["EUR"], 0.92);
        assert_eq!(rates["GBP"], 0.79);
    }

    #[test]
    fn test_rate_table_empty_filter_takes_all_and_skips_bad_rows() {
        let rows = vec![row("EUR", "Euro", "0.92"), row("XXX", "Broken", "--")];
        let rates = parse_rate_table(&rows, &SymbolList::default()).unwrap();
        assert_eq!(rates.len(), 1);
        assert!(rates.contains_key("EUR"));
    }

    #[test]
    fn test_rate_table_without_matches_fails() {
        let rows = vec![row("EUR", "Euro", "0.92")];
        assert_eq!(
            parse_rate_table(&rows, &SymbolList::parse("JPY").unwrap()),
            Err(ParseError::NoRows)
        );
    }

    #[test]
    fn test_catalogue_skips_empty_and_last_wins() {
        let rows = vec![
            row("EUR", "Euro", ""),
            row("", "Header", ""),
            row("JPY", "Yen", ""),
            row("EUR", "Euro Member Countries", ""),
        ];
        let catalogue = parse_catalogue(&rows).unwrap();
        assert_eq!(catalogue.len(), 2);
        assert_eq!(catalogue["EUR"], "Euro Member Countries");
        assert_eq!(catalogue["JPY"], "Yen");
    }

    #[test]
    fn test_kind_mismatch_is_a_failure() {
        let raw = RawExtraction::TableRows(vec![row("EUR", "Euro", "0.92")]);
        assert_eq!(parse(&raw, &ValueKind::Rate), Err(ParseError::KindMismatch));
    }

    proptest! {
        #[test]
        fn prop_day_padding_is_irrelevant(day in 1u32..=28, hour in 0u32..24, minute in 0u32..60) {
            let unpadded = format!("updated Mar {day} 2023 {hour:02}:{minute:02}");
            let padded = format!("updated Mar {day:02} 2023 {hour:02}:{minute:02}");
            prop_assert_eq!(
                parse_updated_timestamp(&unpadded).unwrap(),
                parse_updated_timestamp(&padded).unwrap()
            );
        }

        #[test]
        fn prop_rate_table_stays_within_requested_symbols(
            table in proptest::collection::btree_map("[A-Z]{3}", 0.0001f64..1000.0, 1..20),
            requested in proptest::collection::vec("[A-Z]{3}", 1..8),
        ) {
            let rows: Vec<RawRow> = table
                .iter()
                .map(|(code, rate)| row(code, "Name", &rate.to_string()))
                .collect();
            let symbols = SymbolList::parse(&requested.join(",")).unwrap();

            match parse_rate_table(&rows, &symbols) {
                Ok(rates) => {
                    prop_assert!(rates.len() <= symbols.len());
                    for code in rates.keys() {
                        prop_assert!(symbols.contains(code));
                        prop_assert!(table.contains_key(code));
                    }
                }
                Err(error) => {
                    prop_assert_eq!(error, ParseError::NoRows);
                    prop_assert!(requested.iter().all(|code| !table.contains_key(code)));
                }
            }
        }

        #[test]
        fn prop_grouping_separators_are_ignored(value in 0u64..10_000_000_000) {
            let plain = value.to_string();
            let mut grouped = String::new();
            for (i, c) in plain.chars().enumerate() {
                if i > 0 && (plain.len() - i) % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(c);
            }
            prop_assert_eq!(parse_rate(&grouped).unwrap(), value as f64);
        }
    }
}
