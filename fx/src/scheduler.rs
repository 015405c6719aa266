//! Bounded concurrent execution of task units.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use fxscrape_common::{UnitFailure, UnitResult};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::AggregateResult;
use crate::extractor::Selectors;
use crate::parser::ParsedValue;
use crate::provider::PageSource;
use crate::task::TaskUnit;

/// Configuration for the fan-out scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum units in flight at once; the rest wait their turn.
    pub max_concurrency: usize,
    /// Deadline for each unit's upstream fetch.
    pub unit_timeout: Duration,
    /// Extra attempts for fetch and timeout failures.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            unit_timeout: Duration::from_secs(60),
            max_retries: 0,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Counters across every batch this scheduler has run.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    batches: AtomicU64,
    units_started: AtomicU64,
    units_succeeded: AtomicU64,
    units_failed: AtomicU64,
    units_timed_out: AtomicU64,
    units_retried: AtomicU64,
    in_flight: AtomicU64,
}

impl SchedulerStats {
    /// Get current counters.
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            units_started: self.units_started.load(Ordering::Relaxed),
            units_succeeded: self.units_succeeded.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            units_timed_out: self.units_timed_out.load(Ordering::Relaxed),
            units_retried: self.units_retried.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }

    /// Count a unit as started; it stays in flight until the guard drops,
    /// including when the worker unwinds.
    fn unit_started(&self) -> InFlightGuard<'_> {
        self.units_started.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard(&self.in_flight)
    }

    fn unit_finished(&self, result: &UnitResult<ParsedValue>) {
        match result {
            Ok(_) => {
                self.units_succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(failure) => {
                self.units_failed.fetch_add(1, Ordering::Relaxed);
                if matches!(failure, UnitFailure::Timeout(_)) {
                    self.units_timed_out.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicU64);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatsSnapshot {
    pub batches: u64,
    pub units_started: u64,
    pub units_succeeded: u64,
    pub units_failed: u64,
    pub units_timed_out: u64,
    pub units_retried: u64,
    pub in_flight: u64,
}

/// Shared state handed to every worker.
struct WorkerContext {
    source: Arc<dyn PageSource>,
    selectors: Arc<Selectors>,
    config: SchedulerConfig,
    stats: Arc<SchedulerStats>,
}

impl WorkerContext {
    async fn execute_with_retry(&self, unit: &TaskUnit) -> UnitResult<ParsedValue> {
        let mut attempt = 0;
        loop {
            let result = unit
                .execute(self.source.as_ref(), &self.selectors, self.config.unit_timeout)
                .await;
            match result {
                Err(failure) if failure.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    self.stats.units_retried.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        unit_id = %unit.id,
                        attempt = attempt,
                        error = %failure,
                        "Retrying unit"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                other => return other,
            }
        }
    }
}

/// Runs a batch of units with bounded concurrency and merges their results.
pub struct FanOutScheduler {
    context: Arc<WorkerContext>,
}

impl FanOutScheduler {
    /// Create a scheduler over `source`.
    pub fn new(source: Arc<dyn PageSource>, selectors: Selectors, config: SchedulerConfig) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                source,
                selectors: Arc::new(selectors),
                config,
                stats: Arc::new(SchedulerStats::default()),
            }),
        }
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.context.stats.snapshot()
    }

    /// Run every unit and return the merged aggregate.
    ///
    /// Does not return until each unit has succeeded, failed or timed out.
    /// Units with an id already seen in the batch are skipped.
    #[instrument(
        skip(self, units),
        fields(
            batch_id = %Uuid::new_v4(),
            source = self.context.source.name(),
            units = units.len()
        )
    )]
    pub async fn run(&self, units: Vec<TaskUnit>) -> AggregateResult<ParsedValue> {
        let mut seen = HashSet::new();
        let units: Vec<TaskUnit> = units
            .into_iter()
            .filter(|unit| seen.insert(unit.id.clone()))
            .collect();

        self.context.stats.batches.fetch_add(1, Ordering::Relaxed);
        let aggregate = Arc::new(Mutex::new(AggregateResult::new()));
        let concurrency = self.context.config.max_concurrency.max(1);

        stream::iter(units)
            .map(|unit| {
                let id = unit.id.clone();
                let context = Arc::clone(&self.context);
                let aggregate = Arc::clone(&aggregate);
                let worker = tokio::spawn(async move {
                    let in_flight = context.stats.unit_started();
                    let result = context.execute_with_retry(&unit).await;
                    context.stats.unit_finished(&result);
                    drop(in_flight);

                    match &result {
                        Ok(_) => debug!(unit_id = %unit.id, url = %unit.target, "Unit succeeded"),
                        Err(failure) => warn!(
                            unit_id = %unit.id,
                            url = %unit.target,
                            code = failure.error_code(),
                            error = %failure,
                            "Unit failed"
                        ),
                    }

                    aggregate.lock().record(unit.id, result);
                }
                .in_current_span());
                async move { (id, worker.await) }
            })
            .buffer_unordered(concurrency)
            .for_each(|(id, joined)| {
                if let Err(join_error) = joined {
                    warn!(unit_id = %id, error = %join_error, "Unit worker aborted");
                    self.context.stats.units_failed.fetch_add(1, Ordering::Relaxed);
                    aggregate
                        .lock()
                        .record(id, Err(UnitFailure::Panicked(join_error.to_string())));
                }
                futures::future::ready(())
            })
            .await;

        let result = std::mem::take(&mut *aggregate.lock());
        info!(
            succeeded = result.len(),
            failed = result.failure_count(),
            "Batch completed"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractRule;
    use crate::provider::fixtures::converter_html;
    use crate::provider::StaticPageSource;
    use async_trait::async_trait;

    /// Delegates to a static source but panics on URLs containing `boom`.
    struct PanickingSource(StaticPageSource);

    #[async_trait]
    impl PageSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch(&self, url: &str, timeout: Duration) -> UnitResult<String> {
            if url.contains("boom") {
                panic!("page source blew up on {url}");
            }
            self.0.fetch(url, timeout).await
        }
    }

    fn url(id: &str) -> String {
        format!("https://upstream.test/convert/{id}")
    }

    fn scheduler(source: Arc<StaticPageSource>, config: SchedulerConfig) -> FanOutScheduler {
        FanOutScheduler::new(source, Selectors::default(), config)
    }

    fn rate_unit(id: &str) -> TaskUnit {
        TaskUnit::new(id, url(id), ExtractRule::ConverterRate)
    }

    #[tokio::test]
    async fn test_one_failure_among_ten_is_isolated() {
        let source = Arc::new(StaticPageSource::new());
        let mut units = Vec::new();
        for i in 0..10 {
            let id = format!("U{i}");
            if i == 4 {
                source.set_page(url(&id), "<html><body>layout changed</body></html>");
            } else {
                source.set_page(url(&id), converter_html(&format!("{i}.5 Units"), None));
            }
            units.push(rate_unit(&id));
        }

        let result = scheduler(source, SchedulerConfig::default()).run(units).await;

        assert_eq!(result.len(), 9);
        assert_eq!(result.failure_count(), 1);
        assert!(result.get("U4").is_none());
        assert_eq!(result.get("U7"), Some(&ParsedValue::Rate(7.5)));
        assert!(matches!(result.failures()["U4"], UnitFailure::Extraction(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_units_respect_bound_and_lose_nothing() {
        let source = Arc::new(StaticPageSource::new());
        let mut units = Vec::new();
        for i in 0..100 {
            let id = format!("U{i:03}");
            source.set_delayed_page(
                url(&id),
                Duration::from_millis(5),
                converter_html(&format!("{i}"), None),
            );
            units.push(rate_unit(&id));
        }

        let config = SchedulerConfig {
            max_concurrency: 8,
            ..Default::default()
        };
        let scheduler = scheduler(Arc::clone(&source), config);
        let result = scheduler.run(units).await;

        assert_eq!(result.len(), 100);
        assert_eq!(result.failure_count(), 0);
        for i in 0..100 {
            let id = format!("U{i:03}");
            assert_eq!(result.get(&id), Some(&ParsedValue::Rate(i as f64)));
        }
        assert!(source.peak_in_flight() <= 8);
        assert!(source.peak_in_flight() >= 2);

        let stats = scheduler.stats();
        assert_eq!(stats.units_succeeded, 100);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_timeout_only_fails_that_unit() {
        let source = Arc::new(StaticPageSource::new());
        source.set_page(url("EUR"), converter_html("0.92 Euros", None));
        source.set_delayed_page(url("JPY"), Duration::from_secs(10), converter_html("148", None));

        let config = SchedulerConfig {
            unit_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let scheduler = scheduler(source, config);
        let result = scheduler
            .run(vec![rate_unit("EUR"), rate_unit("JPY")])
            .await;

        assert!(result.is_success());
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("EUR"), Some(&ParsedValue::Rate(0.92)));
        assert_eq!(result.failures()["JPY"], UnitFailure::Timeout(50));
        assert_eq!(scheduler.stats().units_timed_out, 1);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_isolated() {
        let inner = StaticPageSource::new();
        inner.set_page(url("EUR"), converter_html("0.92 Euros", None));
        inner.set_page(url("GBP"), converter_html("0.79 British Pounds", None));
        let source = Arc::new(PanickingSource(inner));

        let scheduler = FanOutScheduler::new(source, Selectors::default(), SchedulerConfig::default());
        let result = scheduler
            .run(vec![rate_unit("EUR"), rate_unit("boom"), rate_unit("GBP")])
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("EUR"), Some(&ParsedValue::Rate(0.92)));
        assert_eq!(result.get("GBP"), Some(&ParsedValue::Rate(0.79)));
        assert!(matches!(result.failures()["boom"], UnitFailure::Panicked(_)));

        let stats = scheduler.stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.units_started, 3);
        assert_eq!(stats.units_succeeded, 2);
        assert_eq!(stats.units_failed, 1);
    }

    #[tokio::test]
    async fn test_same_batch_twice_is_identical() {
        let source = Arc::new(StaticPageSource::new());
        for id in ["EUR", "GBP", "JPY"] {
            source.set_page(url(id), converter_html("1,234.5", None));
        }
        let units: Vec<TaskUnit> = ["EUR", "GBP", "JPY"].into_iter().map(rate_unit).collect();
        let scheduler = scheduler(source, SchedulerConfig::default());

        let first = scheduler.run(units.clone()).await;
        let second = scheduler.run(units).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_ids_run_once() {
        let source = Arc::new(StaticPageSource::new());
        source.set_page(url("EUR"), converter_html("0.92", None));

        let result = scheduler(Arc::clone(&source), SchedulerConfig::default())
            .run(vec![rate_unit("EUR"), rate_unit("EUR")])
            .await;

        assert_eq!(result.len(), 1);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let source = Arc::new(StaticPageSource::new());
        let result = scheduler(source, SchedulerConfig::default()).run(Vec::new()).await;

        assert!(!result.is_success());
        assert_eq!(result.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_only_retryable_failures() {
        let source = Arc::new(StaticPageSource::new());
        source.set_failure(url("EUR"), UnitFailure::Fetch("connection reset".into()));
        source.set_page(url("GBP"), "<html></html>");

        let config = SchedulerConfig {
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let scheduler = scheduler(Arc::clone(&source), config);
        let result = scheduler.run(vec![rate_unit("EUR"), rate_unit("GBP")]).await;

        assert_eq!(result.failure_count(), 2);
        // EUR: 1 + 2 retries, GBP: extraction failure is not retried.
        assert_eq!(source.fetch_count(), 4);
        assert_eq!(scheduler.stats().units_retried, 2);
    }
}
