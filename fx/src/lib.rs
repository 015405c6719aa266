//! fxscrape FX Engine
//!
//! Retrieves foreign exchange rates from pages that only publish them as
//! rendered HTML and merges many independent fetches into one result.
//!
//! # Features
//!
//! - Bounded concurrent fan-out of fetch-and-extract units
//! - Per-unit timeouts and optional retries that never fail the batch
//! - Pure parsers for rates, "last updated" timestamps and symbol tables
//! - One engine entry point per endpoint shape
//!
//! # Example
//!
//! ```rust,ignore
//! use fxscrape_fx::{FxEngine, FxEngineConfig, HttpPageSource};
//! use fxscrape_common::{Currency, SymbolList};
//!
//! let source = Arc::new(HttpPageSource::new(DEFAULT_USER_AGENT)?);
//! let engine = FxEngine::new(source, FxEngineConfig::default());
//!
//! let symbols = SymbolList::parse("EUR,JPY")?;
//! let rates = engine.latest(&Currency::usd(), &symbols).await?;
//! println!("{} rates, {} failed", rates.len(), rates.failure_count());
//! ```

pub mod aggregate;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod parser;
pub mod provider;
pub mod scheduler;
pub mod task;

pub use aggregate::AggregateResult;
pub use conversion::{Conversion, ConversionRequest};
pub use engine::{FxEngine, FxEngineConfig};
pub use error::{FxError, FxResult};
pub use extractor::{ExtractRule, Selectors, UpstreamUrls};
pub use parser::{ParseError, ParsedValue};
pub use provider::{HttpPageSource, PageSource, DEFAULT_USER_AGENT};
pub use scheduler::{FanOutScheduler, SchedulerConfig, SchedulerStatsSnapshot};
pub use task::TaskUnit;
