//! fxscrape Common Types
//!
//! Shared types used across the fxscrape crates: currency codes, requested
//! symbol lists, calendar helpers and the failure taxonomy of a single fetch.

pub mod currency;
pub mod error;
pub mod time;

pub use currency::*;
pub use error::*;
pub use time::*;
