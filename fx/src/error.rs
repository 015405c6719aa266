//! FX engine error types.

use thiserror::Error;

/// Errors raised before any unit is scheduled.
///
/// Per-unit fetch, extraction and parse failures are not errors at this
/// level; they are counted in the aggregate.
#[derive(Debug, Error, PartialEq)]
pub enum FxError {
    /// Caller input that cannot form a request.
    #[error("Invalid {field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// Requested time series spans too many days.
    #[error("Range of {days} days exceeds maximum of {max}")]
    RangeTooLong { days: usize, max: usize },

    /// More symbols than one request may fan out to.
    #[error("{count} symbols exceeds maximum of {max}")]
    TooManySymbols { count: usize, max: usize },
}

impl FxError {
    /// Get error code for response envelopes.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidInput { .. } => "INVALID_INPUT",
            FxError::RangeTooLong { .. } => "RANGE_TOO_LONG",
            FxError::TooManySymbols { .. } => "TOO_MANY_SYMBOLS",
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
