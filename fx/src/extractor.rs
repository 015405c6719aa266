//! Structural extraction of raw text from upstream pages.
//!
//! Selectors and URL shapes for the upstream site are kept together here so a
//! redesign only touches this module and the parser's token rules.

use chrono::NaiveDate;
use fxscrape_common::{format_date, Currency, SymbolList, UnitFailure, UnitResult};
use scraper::{ElementRef, Html, Selector};

use crate::parser::{RawExtraction, RawRow, ValueKind};

/// Default upstream site.
pub const DEFAULT_UPSTREAM: &str = "https://www.xe.com";

/// CSS selectors for the upstream markup.
#[derive(Debug, Clone)]
pub struct Selectors {
    /// Rows of the daily currency table.
    pub table_rows: String,
    /// Currency code cell, relative to a row.
    pub row_code: String,
    /// Display name cell, relative to a row.
    pub row_name: String,
    /// Rate cell, relative to a row.
    pub row_rate: String,
    /// Converter result ("big rate") text.
    pub big_rate: String,
    /// Converter "last updated" sub-text.
    pub updated: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            table_rows: "table.currencytables__Table-sc-xlq26m-3 > tbody > tr".to_string(),
            row_code: "*[scope]".to_string(),
            row_name: "td:nth-child(2)".to_string(),
            row_rate: "td:nth-child(3)".to_string(),
            big_rate: ".result__BigRate-sc-1bsijpp-1.dPdXSB".to_string(),
            updated: "div.result__LiveSubText-sc-1bsijpp-2.jcIWiH".to_string(),
        }
    }
}

/// URL shapes of the upstream pages.
#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    base: String,
}

impl UpstreamUrls {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Daily currency table for `base` on `date`.
    pub fn currency_table(&self, base: &Currency, date: NaiveDate) -> String {
        format!(
            "{}/currencytables/?from={}&date={}",
            self.base,
            base,
            format_date(date)
        )
    }

    /// Live converter page for `amount` of `from` in `to`.
    pub fn converter(&self, amount: f64, from: &Currency, to: &Currency) -> String {
        format!(
            "{}/currencyconverter/convert/?Amount={}&From={}&To={}",
            self.base, amount, from, to
        )
    }
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self::new(DEFAULT_UPSTREAM)
    }
}

/// What to pull out of a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractRule {
    /// Every row of the currency table as a code and display name.
    Catalogue,
    /// Currency table rates, restricted to the given symbols when non-empty.
    TableRates(SymbolList),
    /// Converter big rate only.
    ConverterRate,
    /// Converter big rate and its "last updated" text.
    ConverterQuote,
}

impl ExtractRule {
    /// The value kind the parser should produce for this rule.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            ExtractRule::Catalogue => ValueKind::Catalogue,
            ExtractRule::TableRates(symbols) => ValueKind::RateTable(symbols.clone()),
            ExtractRule::ConverterRate => ValueKind::Rate,
            ExtractRule::ConverterQuote => ValueKind::RateWithTimestamp,
        }
    }

    /// Pull raw fragments out of an HTML document.
    pub fn extract(&self, body: &str, selectors: &Selectors) -> UnitResult<RawExtraction> {
        let document = Html::parse_document(body);
        match self {
            ExtractRule::Catalogue | ExtractRule::TableRates(_) => {
                extract_table_rows(&document, selectors)
            }
            ExtractRule::ConverterRate => {
                let big_rate = first_text(document.root_element(), &selectors.big_rate)?
                    .ok_or_else(|| UnitFailure::Extraction("big rate".to_string()))?;
                Ok(RawExtraction::BigRate {
                    big_rate,
                    updated: None,
                })
            }
            ExtractRule::ConverterQuote => {
                let root = document.root_element();
                let big_rate = first_text(root, &selectors.big_rate)?
                    .ok_or_else(|| UnitFailure::Extraction("big rate".to_string()))?;
                let updated = first_text(root, &selectors.updated)?;
                Ok(RawExtraction::BigRate { big_rate, updated })
            }
        }
    }
}

fn extract_table_rows(document: &Html, selectors: &Selectors) -> UnitResult<RawExtraction> {
    let row_selector = compile(&selectors.table_rows)?;
    let mut rows = Vec::new();
    for row in document.select(&row_selector) {
        rows.push(RawRow {
            code: first_text(row, &selectors.row_code)?.unwrap_or_default(),
            name: first_text(row, &selectors.row_name)?.unwrap_or_default(),
            rate: first_text(row, &selectors.row_rate)?.unwrap_or_default(),
        });
    }
    if rows.is_empty() {
        return Err(UnitFailure::Extraction("currency table".to_string()));
    }
    Ok(RawExtraction::TableRows(rows))
}

/// Trimmed text of the first descendant matching `selector`, `None` when
/// absent or blank.
fn first_text(scope: ElementRef<'_>, selector: &str) -> UnitResult<Option<String>> {
    let compiled = compile(selector)?;
    Ok(scope
        .select(&compiled)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty()))
}

fn compile(selector: &str) -> UnitResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| UnitFailure::Extraction(format!("invalid selector {selector:?}: {e}")))
}
