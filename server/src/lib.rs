//! fxscrape Server
//!
//! Thin JSON API over the FX engine. Each request validates its input,
//! runs one scrape batch and shapes the aggregate into a response envelope.

pub mod config;
pub mod envelope;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use routes::router;
pub use state::AppState;
