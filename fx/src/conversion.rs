//! Currency conversion types.

use chrono::NaiveDate;
use fxscrape_common::{Currency, CurrencyPair};
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// Request to convert an amount between two currencies.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// Amount of the base currency.
    pub amount: f64,
    /// Currency pair, base converted into quote.
    pub pair: CurrencyPair,
}

impl ConversionRequest {
    /// Create a new conversion request.
    ///
    /// The amount must be a finite number greater than zero.
    pub fn new(amount: f64, from: Currency, to: Currency) -> FxResult<Self> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(FxError::InvalidInput {
                field: "amount",
                message: format!("must be a positive number, got {amount}"),
            });
        }
        Ok(Self {
            amount,
            pair: CurrencyPair::new(from, to),
        })
    }
}

/// Represents a completed live conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Currency pair converted.
    pub pair: CurrencyPair,
    /// Input amount.
    pub amount: f64,
    /// Converted total as quoted upstream.
    pub result: f64,
    /// Upstream "last updated" time, Unix seconds.
    pub timestamp: Option<i64>,
    /// Day the conversion was served.
    pub date: NaiveDate,
}

impl Conversion {
    /// Create a new conversion record.
    pub fn new(request: &ConversionRequest, result: f64, timestamp: Option<i64>, date: NaiveDate) -> Self {
        Self {
            pair: request.pair.clone(),
            amount: request.amount,
            result,
            timestamp,
            date,
        }
    }

    /// Get the effective rate used.
    pub fn effective_rate(&self) -> f64 {
        if self.amount == 0.0 {
            return 0.0;
        }
        self.result / self.amount
    }
}
