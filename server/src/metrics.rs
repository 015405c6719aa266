//! Metrics collection for server monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fxscrape_fx::SchedulerStatsSnapshot;

/// Request-level metrics.
pub struct Metrics {
    /// Total requests handled.
    pub requests_total: AtomicU64,
    /// Requests answered with `success: true`.
    pub requests_success: AtomicU64,
    /// Requests answered with `success: false` after scraping.
    pub requests_empty: AtomicU64,
    /// Requests rejected for malformed input.
    pub requests_rejected: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_success: AtomicU64::new(0),
            requests_empty: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
        }
    }

    /// Record a served request by its envelope outcome.
    pub fn request_served(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_empty.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a request rejected before scraping.
    pub fn request_rejected(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_empty: self.requests_empty.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format, including scheduler counters.
    pub fn to_prometheus(&self, scheduler: &SchedulerStatsSnapshot) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP fxscrape_requests_total Total number of API requests
# TYPE fxscrape_requests_total counter
fxscrape_requests_total {}

# HELP fxscrape_requests_success Requests answered with data
# TYPE fxscrape_requests_success counter
fxscrape_requests_success {}

# HELP fxscrape_requests_empty Requests answered with success=false
# TYPE fxscrape_requests_empty counter
fxscrape_requests_empty {}

# HELP fxscrape_requests_rejected Requests rejected for malformed input
# TYPE fxscrape_requests_rejected counter
fxscrape_requests_rejected {}

# HELP fxscrape_batches_total Total scrape batches run
# TYPE fxscrape_batches_total counter
fxscrape_batches_total {}

# HELP fxscrape_units_succeeded Units that produced a value
# TYPE fxscrape_units_succeeded counter
fxscrape_units_succeeded {}

# HELP fxscrape_units_failed Units dropped from their batch
# TYPE fxscrape_units_failed counter
fxscrape_units_failed {}

# HELP fxscrape_units_timed_out Units abandoned at their timeout
# TYPE fxscrape_units_timed_out counter
fxscrape_units_timed_out {}

# HELP fxscrape_units_retried Retry attempts made
# TYPE fxscrape_units_retried counter
fxscrape_units_retried {}

# HELP fxscrape_units_in_flight Units currently fetching
# TYPE fxscrape_units_in_flight gauge
fxscrape_units_in_flight {}
"#,
            snapshot.requests_total,
            snapshot.requests_success,
            snapshot.requests_empty,
            snapshot.requests_rejected,
            scheduler.batches,
            scheduler.units_succeeded,
            scheduler.units_failed,
            scheduler.units_timed_out,
            scheduler.units_retried,
            scheduler.in_flight,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_empty: u64,
    pub requests_rejected: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
