//! Shared handler state.

use std::sync::Arc;

use chrono::NaiveDate;
use fxscrape_fx::FxEngine;

use crate::metrics::{Metrics, SharedMetrics};
use crate::routes::ApiError;

/// State injected into every handler through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FxEngine>,
    pub metrics: SharedMetrics,
    /// Source of "today" for the symbol catalogue and served dates.
    pub clock: fn() -> NaiveDate,
}

impl AppState {
    pub fn new(engine: FxEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            metrics: Arc::new(Metrics::new()),
            clock: fxscrape_common::today,
        }
    }

    /// Replace the clock, pinning "today" to a fixed day.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Count a request the envelope answered.
    pub fn served(&self, success: bool) {
        self.metrics.request_served(success);
    }

    /// Count a rejected request and pass its error through.
    pub fn rejected(&self, error: ApiError) -> ApiError {
        self.metrics.request_rejected();
        error
    }
}
