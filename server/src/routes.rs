//! HTTP routes.
//!
//! Handlers validate query input, hand one batch to the engine and shape
//! the aggregate into its envelope. Scrape failures never change the status
//! code: an empty aggregate is still `200` with `success: false`. Only
//! malformed input is answered with `400`.

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use fxscrape_common::{parse_date, Currency, SymbolList};
use fxscrape_fx::{ConversionRequest, FxError};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::envelope::{
    ConvertResponse, ErrorResponse, RatesResponse, SymbolsResponse, TimeSeriesResponse,
};
use crate::state::AppState;

/// Error answered before any fetch is scheduled.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new("INVALID_INPUT", message),
        }
    }
}

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new(err.error_code(), err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Query for `/{date}` and `/latest`.
#[derive(Debug, Default, Deserialize)]
pub struct RatesParams {
    pub base: Option<String>,
    pub symbols: Option<String>,
}

/// Query for `/convert`.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    pub amount: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Query for `/timeseries`.
#[derive(Debug, Default, Deserialize)]
pub struct TimeSeriesParams {
    pub base: Option<String>,
    pub symbols: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/symbols", get(symbols))
        .route("/convert", get(convert))
        .route("/latest", get(latest))
        .route("/timeseries", get(timeseries))
        .route("/{date}", get(historical))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.to_prometheus(&state.engine.stats());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

async fn symbols(State(state): State<AppState>) -> Json<SymbolsResponse> {
    let aggregate = state.engine.symbols(state.today()).await;
    let response = SymbolsResponse::from_aggregate(aggregate);
    state.served(response.success);
    Json(response)
}

async fn historical(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(params): Query<RatesParams>,
) -> Result<Json<RatesResponse>, ApiError> {
    let date = required_date("date", Some(date)).map_err(|e| state.rejected(e))?;
    let base = required_currency("base", params.base).map_err(|e| state.rejected(e))?;
    let symbols = symbol_list(params.symbols).map_err(|e| state.rejected(e))?;

    let aggregate = state.engine.historical(date, &base, &symbols).await;
    let response = RatesResponse::from_aggregate(aggregate, &base, date);
    state.served(response.success);
    Ok(Json(response))
}

async fn convert(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let request = convert_request(params).map_err(|e| state.rejected(e))?;

    let conversion = state.engine.convert(&request, state.today()).await;
    let response = ConvertResponse::from_conversion(conversion);
    state.served(response.success);
    Ok(Json(response))
}

async fn latest(
    State(state): State<AppState>,
    Query(params): Query<RatesParams>,
) -> Result<Json<RatesResponse>, ApiError> {
    let base = required_currency("base", params.base).map_err(|e| state.rejected(e))?;
    let symbols = symbol_list(params.symbols).map_err(|e| state.rejected(e))?;

    let aggregate = state
        .engine
        .latest(&base, &symbols)
        .await
        .map_err(|e| state.rejected(e.into()))?;
    let response = RatesResponse::from_aggregate(aggregate, &base, state.today());
    state.served(response.success);
    Ok(Json(response))
}

async fn timeseries(
    State(state): State<AppState>,
    Query(params): Query<TimeSeriesParams>,
) -> Result<Json<TimeSeriesResponse>, ApiError> {
    let base = required_currency("base", params.base).map_err(|e| state.rejected(e))?;
    let start = required_date("start_at", params.start_at).map_err(|e| state.rejected(e))?;
    let end = required_date("end_at", params.end_at).map_err(|e| state.rejected(e))?;
    let symbols = symbol_list(params.symbols).map_err(|e| state.rejected(e))?;

    let aggregate = state
        .engine
        .timeseries(&base, &symbols, start, end)
        .await
        .map_err(|e| state.rejected(e.into()))?;
    let response = TimeSeriesResponse::from_aggregate(aggregate, &base, start, end);
    state.served(response.success);
    Ok(Json(response))
}

fn required_currency(field: &str, value: Option<String>) -> Result<Currency, ApiError> {
    let value = value.unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::invalid_input(format!("{field} is required")));
    }
    Currency::parse(&value).ok_or_else(|| {
        ApiError::invalid_input(format!("{field} must be a three-letter currency code, got {value:?}"))
    })
}

fn required_date(field: &str, value: Option<String>) -> Result<NaiveDate, ApiError> {
    let value = value.unwrap_or_default();
    parse_date(&value).ok_or_else(|| {
        ApiError::invalid_input(format!("{field} must be a YYYY-MM-DD date, got {value:?}"))
    })
}

fn symbol_list(value: Option<String>) -> Result<SymbolList, ApiError> {
    let symbols = SymbolList::parse(value.as_deref().unwrap_or_default())
        .map_err(|e| ApiError::invalid_input(format!("symbols: {e}")))?;
    debug!(symbols = symbols.len(), "Parsed symbol list");
    Ok(symbols)
}

fn convert_request(params: ConvertParams) -> Result<ConversionRequest, ApiError> {
    let raw = params.amount.unwrap_or_default();
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::invalid_input(format!("amount must be a number, got {raw:?}")))?;
    let from = required_currency("from", params.from)?;
    let to = required_currency("to", params.to)?;
    Ok(ConversionRequest::new(amount, from, to)?)
}
