//! Main FX engine implementation.
//!
//! Builds one batch of task units per request shape and reduces the
//! scheduler's aggregate to the typed result each endpoint needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use fxscrape_common::{
    catalogue_date, constants, days_inclusive, format_date, span_days, Currency, SymbolList,
    UnitFailure,
};
use tracing::{info, instrument};

use crate::aggregate::AggregateResult;
use crate::conversion::{Conversion, ConversionRequest};
use crate::error::{FxError, FxResult};
use crate::extractor::{ExtractRule, Selectors, UpstreamUrls};
use crate::parser::ParsedValue;
use crate::provider::PageSource;
use crate::scheduler::{FanOutScheduler, SchedulerConfig, SchedulerStatsSnapshot};
use crate::task::TaskUnit;

/// Configuration for the FX engine.
#[derive(Debug, Clone)]
pub struct FxEngineConfig {
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Upstream selectors.
    pub selectors: Selectors,
    /// Upstream site root.
    pub upstream_url: String,
    /// Longest accepted time series, in days.
    pub max_timeseries_days: usize,
    /// Most symbols accepted by `latest`, which fetches one page per symbol.
    pub max_symbols: usize,
    /// Base currency of the table the symbol catalogue is read from.
    pub catalogue_base: Currency,
}

impl Default for FxEngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            selectors: Selectors::default(),
            upstream_url: crate::extractor::DEFAULT_UPSTREAM.to_string(),
            max_timeseries_days: constants::MAX_TIMESERIES_DAYS,
            max_symbols: constants::MAX_SYMBOLS,
            catalogue_base: Currency::usd(),
        }
    }
}

/// The main FX engine.
pub struct FxEngine {
    scheduler: FanOutScheduler,
    urls: UpstreamUrls,
    config: FxEngineConfig,
}

impl FxEngine {
    /// Create a new FX engine over the given page source.
    pub fn new(source: Arc<dyn PageSource>, config: FxEngineConfig) -> Self {
        Self {
            scheduler: FanOutScheduler::new(
                source,
                config.selectors.clone(),
                config.scheduler.clone(),
            ),
            urls: UpstreamUrls::new(config.upstream_url.clone()),
            config,
        }
    }

    /// Catalogue of currency codes to display names.
    ///
    /// Read from the most recent complete table relative to `today`.
    #[instrument(skip(self))]
    pub async fn symbols(&self, today: NaiveDate) -> AggregateResult<String> {
        let date = catalogue_date(today);
        let unit = TaskUnit::new(
            format_date(date),
            self.urls.currency_table(&self.config.catalogue_base, date),
            ExtractRule::Catalogue,
        );

        self.scheduler
            .run(vec![unit])
            .await
            .flatten(|_, value| match value {
                ParsedValue::Catalogue(catalogue) => Ok(catalogue),
                other => Err(unexpected(&other)),
            })
    }

    /// Rates of `base` against `symbols` on a past `date`; all listed
    /// currencies when `symbols` is empty.
    #[instrument(skip_all, fields(base = %base, date = %date))]
    pub async fn historical(
        &self,
        date: NaiveDate,
        base: &Currency,
        symbols: &SymbolList,
    ) -> AggregateResult<f64> {
        let unit = TaskUnit::new(
            format_date(date),
            self.urls.currency_table(base, date),
            ExtractRule::TableRates(symbols.clone()),
        );

        self.scheduler
            .run(vec![unit])
            .await
            .flatten(|_, value| rate_table(value))
    }

    /// Live conversion of `request.amount`.
    ///
    /// `None` when the converter page yielded nothing usable.
    #[instrument(skip_all, fields(pair = %request.pair, amount = request.amount))]
    pub async fn convert(&self, request: &ConversionRequest, today: NaiveDate) -> Option<Conversion> {
        let unit = TaskUnit::new(
            request.pair.quote.code(),
            self.urls
                .converter(request.amount, &request.pair.base, &request.pair.quote),
            ExtractRule::ConverterQuote,
        );

        let aggregate = self.scheduler.run(vec![unit]).await.try_map(|_, value| match value {
            ParsedValue::RateWithTimestamp { rate, timestamp } => {
                Ok(Conversion::new(request, rate, timestamp, today))
            }
            other => Err(unexpected(&other)),
        });

        let conversion = aggregate.into_values().into_values().next();
        if let Some(conversion) = &conversion {
            info!(
                result = conversion.result,
                effective_rate = conversion.effective_rate(),
                "Conversion completed"
            );
        }
        conversion
    }

    /// Current rate of `base` against each symbol, one fetch per symbol.
    #[instrument(skip_all, fields(base = %base, symbols = symbols.len()))]
    pub async fn latest(
        &self,
        base: &Currency,
        symbols: &SymbolList,
    ) -> FxResult<AggregateResult<f64>> {
        if symbols.len() > self.config.max_symbols {
            return Err(FxError::TooManySymbols {
                count: symbols.len(),
                max: self.config.max_symbols,
            });
        }

        let units = symbols
            .iter()
            .map(|symbol| {
                TaskUnit::new(
                    symbol.code(),
                    self.urls.converter(1.0, base, symbol),
                    ExtractRule::ConverterRate,
                )
            })
            .collect();

        Ok(self.scheduler.run(units).await.try_map(|_, value| match value {
            ParsedValue::Rate(rate) => Ok(rate),
            other => Err(unexpected(&other)),
        }))
    }

    /// Rates per day in `[start, end]`, keyed by ISO date.
    ///
    /// An inverted range yields an empty aggregate.
    #[instrument(skip_all, fields(base = %base, start = %start, end = %end))]
    pub async fn timeseries(
        &self,
        base: &Currency,
        symbols: &SymbolList,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FxResult<AggregateResult<BTreeMap<String, f64>>> {
        let days = span_days(start, end);
        if days > self.config.max_timeseries_days {
            return Err(FxError::RangeTooLong {
                days,
                max: self.config.max_timeseries_days,
            });
        }

        let units = days_inclusive(start, end)
            .into_iter()
            .map(|day| {
                TaskUnit::new(
                    format_date(day),
                    self.urls.currency_table(base, day),
                    ExtractRule::TableRates(symbols.clone()),
                )
            })
            .collect();

        Ok(self.scheduler.run(units).await.try_map(|_, value| rate_table(value)))
    }

    /// Get scheduler counters.
    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.scheduler.stats()
    }
}

fn rate_table(value: ParsedValue) -> Result<BTreeMap<String, f64>, UnitFailure> {
    match value {
        ParsedValue::RateTable(rates) => Ok(rates),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(value: &ParsedValue) -> UnitFailure {
    UnitFailure::Parse(format!("unexpected value {value:?}"))
}
