//! Currency codes and requested-symbol lists.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InvalidCurrency;

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Parse a currency code supplied by a caller.
    ///
    /// Codes are three ASCII letters; anything else is rejected.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self::new(code))
        } else {
            None
        }
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A currency pair for FX operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency (being converted from).
    pub base: Currency,
    /// Quote currency (being converted to).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Ordered, duplicate-free list of requested symbols.
///
/// Built from the comma separated `symbols` query parameter. Empty items are
/// dropped and the first occurrence of a repeated code keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolList(Vec<Currency>);

impl SymbolList {
    /// Parse `"EUR,JPY,eur"` style input.
    ///
    /// Every non-empty item must be a three-letter code; the first one that
    /// is not is returned as the error.
    pub fn parse(raw: &str) -> Result<Self, InvalidCurrency> {
        let mut symbols: Vec<Currency> = Vec::new();
        for item in raw.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let currency = Currency::parse(item).ok_or_else(|| InvalidCurrency(item.to_string()))?;
            if !symbols.contains(&currency) {
                symbols.push(currency);
            }
        }
        Ok(Self(symbols))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c.code() == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.0.iter()
    }
}
