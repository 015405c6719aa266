//! Failure taxonomy for a single fetch-and-extract unit.

use thiserror::Error;

/// Why one unit of a batch produced nothing.
///
/// Every variant is handled the same way by the scheduler: the unit is
/// dropped from the aggregate and counted as failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitFailure {
    /// The upstream document could not be retrieved.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The fetch did not finish within the per-unit timeout.
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// An expected markup fragment was absent.
    #[error("Fragment not found: {0}")]
    Extraction(String),

    /// A fragment was present but not in the expected format.
    #[error("Parse failed: {0}")]
    Parse(String),

    /// The worker running the unit panicked or was cancelled.
    #[error("Worker aborted: {0}")]
    Panicked(String),
}

impl UnitFailure {
    /// Check if this failure is worth another attempt.
    ///
    /// Extraction and parse failures are deterministic for a given document.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UnitFailure::Fetch(_) | UnitFailure::Timeout(_))
    }

    /// Get a stable code for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            UnitFailure::Fetch(_) => "FETCH_FAILED",
            UnitFailure::Timeout(_) => "TIMEOUT",
            UnitFailure::Extraction(_) => "EXTRACTION_FAILED",
            UnitFailure::Parse(_) => "PARSE_FAILED",
            UnitFailure::Panicked(_) => "WORKER_ABORTED",
        }
    }
}

/// A caller-supplied code that is not three ASCII letters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid currency code: {0:?}")]
pub struct InvalidCurrency(pub String);

/// Result type alias for unit execution.
pub type UnitResult<T> = std::result::Result<T, UnitFailure>;
