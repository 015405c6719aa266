//! One independent fetch-and-extract job.

use std::time::Duration;

use fxscrape_common::{UnitFailure, UnitResult};

use crate::extractor::{ExtractRule, Selectors};
use crate::parser::{self, ParsedValue};
use crate::provider::PageSource;

/// A unit of work: fetch `target`, apply `rule`, parse the fragments.
///
/// Units carry no state beyond their own fields and may run on any worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUnit {
    /// Symbol code or ISO date; unique within a batch.
    pub id: String,
    /// Upstream URL.
    pub target: String,
    /// Extraction rule for the fetched document.
    pub rule: ExtractRule,
}

impl TaskUnit {
    /// Create a new unit.
    pub fn new(id: impl Into<String>, target: impl Into<String>, rule: ExtractRule) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            rule,
        }
    }

    /// Fetch, extract and parse once.
    ///
    /// The fetch is abandoned (its future dropped) once `timeout` elapses.
    pub async fn execute(
        &self,
        source: &dyn PageSource,
        selectors: &Selectors,
        timeout: Duration,
    ) -> UnitResult<ParsedValue> {
        let body = match tokio::time::timeout(timeout, source.fetch(&self.target, timeout)).await {
            Ok(fetched) => fetched?,
            Err(_) => return Err(UnitFailure::Timeout(timeout.as_millis() as u64)),
        };

        let raw = self.rule.extract(&body, selectors)?;
        Ok(parser::parse(&raw, &self.rule.value_kind())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fixtures::{converter_html, currency_table_html};
    use crate::provider::StaticPageSource;
    use fxscrape_common::SymbolList;

    const URL: &str = "https://upstream.test/page";

    #[tokio::test]
    async fn test_execute_converter_rate() {
        let source = StaticPageSource::new();
        source.set_page(URL, converter_html("1,480.25 Japanese Yen", None));

        let unit = TaskUnit::new("JPY", URL, ExtractRule::ConverterRate);
        let value = unit
            .execute(&source, &Selectors::default(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(value, ParsedValue::Rate(1480.25));
    }

    #[tokio::test]
    async fn test_execute_table_rates() {
        let source = StaticPageSource::new();
        source.set_page(
            URL,
            currency_table_html(&[("EUR", "Euro", "0.92"), ("JPY", "Yen", "148.2")]),
        );

        let unit = TaskUnit::new(
            "2024-01-05",
            URL,
            ExtractRule::TableRates(SymbolList::parse("JPY").unwrap()),
        );
        let value = unit
            .execute(&source, &Selectors::default(), Duration::from_secs(1))
            .await
            .unwrap();

        match value {
            ParsedValue::RateTable(rates) => {
                assert_eq!(rates.len(), 1);
                assert_eq!(rates["JPY"], 148.2);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let source = StaticPageSource::new();
        source.set_delayed_page(URL, Duration::from_secs(5), converter_html("0.92", None));

        let unit = TaskUnit::new("EUR", URL, ExtractRule::ConverterRate);
        let result = unit
            .execute(&source, &Selectors::default(), Duration::from_millis(20))
            .await;

        assert_eq!(result, Err(UnitFailure::Timeout(20)));
    }

    #[tokio::test]
    async fn test_execute_parse_failure() {
        let source = StaticPageSource::new();
        source.set_page(URL, converter_html("unavailable", None));

        let unit = TaskUnit::new("EUR", URL, ExtractRule::ConverterRate);
        let result = unit
            .execute(&source, &Selectors::default(), Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(UnitFailure::Parse(_))));
    }
}
