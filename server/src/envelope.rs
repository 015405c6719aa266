//! JSON response envelopes.
//!
//! Every endpoint answers with `success` plus its own payload fields. An
//! aggregate with no values becomes the zero value of its envelope, which
//! carries `success: false` and empty payload fields.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fxscrape_common::{format_date, Currency};
use fxscrape_fx::{AggregateResult, Conversion};
use serde::{Deserialize, Serialize};

/// `GET /symbols` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolsResponse {
    pub success: bool,
    pub symbols: BTreeMap<String, String>,
}

impl SymbolsResponse {
    pub fn from_aggregate(aggregate: AggregateResult<String>) -> Self {
        if !aggregate.is_success() {
            return Self::default();
        }
        Self {
            success: true,
            symbols: aggregate.into_values(),
        }
    }
}

/// `GET /{date}` and `GET /latest` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatesResponse {
    pub success: bool,
    pub base: String,
    pub date: String,
    pub rates: BTreeMap<String, f64>,
}

impl RatesResponse {
    pub fn from_aggregate(aggregate: AggregateResult<f64>, base: &Currency, date: NaiveDate) -> Self {
        if !aggregate.is_success() {
            return Self::default();
        }
        Self {
            success: true,
            base: base.to_string(),
            date: format_date(date),
            rates: aggregate.into_values(),
        }
    }
}

/// Echo of the conversion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertQuery {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

/// Implied rate and upstream "last updated" time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertInfo {
    pub rate: f64,
    /// Unix seconds; `null` when the upstream time could not be read.
    pub timestamp: Option<i64>,
}

/// `GET /convert` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub query: ConvertQuery,
    pub info: ConvertInfo,
    pub date: String,
    pub result: f64,
}

impl ConvertResponse {
    pub fn from_conversion(conversion: Option<Conversion>) -> Self {
        let Some(conversion) = conversion else {
            return Self::default();
        };
        Self {
            success: true,
            query: ConvertQuery {
                from: conversion.pair.base.to_string(),
                to: conversion.pair.quote.to_string(),
                amount: conversion.amount,
            },
            info: ConvertInfo {
                rate: conversion.effective_rate(),
                timestamp: conversion.timestamp,
            },
            date: format_date(conversion.date),
            result: conversion.result,
        }
    }
}

/// `GET /timeseries` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResponse {
    pub success: bool,
    pub base: String,
    pub start_at: String,
    pub end_at: String,
    pub rates: BTreeMap<String, BTreeMap<String, f64>>,
}

impl TimeSeriesResponse {
    pub fn from_aggregate(
        aggregate: AggregateResult<BTreeMap<String, f64>>,
        base: &Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        if !aggregate.is_success() {
            return Self::default();
        }
        Self {
            success: true,
            base: base.to_string(),
            start_at: format_date(start),
            end_at: format_date(end),
            rates: aggregate.into_values(),
        }
    }
}

/// Error detail for rejected requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Envelope for requests rejected before any fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
