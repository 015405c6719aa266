//! Merged outcome of a batch of units.

use std::collections::BTreeMap;

use fxscrape_common::{UnitFailure, UnitResult};

/// Keyed results of a batch.
///
/// Successful units land in `values`; failed units are kept apart in
/// `failures` and never appear as value entries.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult<V> {
    values: BTreeMap<String, V>,
    failures: BTreeMap<String, UnitFailure>,
}

impl<V> AggregateResult<V> {
    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    /// Merge one unit's outcome.
    pub fn record(&mut self, id: impl Into<String>, result: UnitResult<V>) {
        let id = id.into();
        match result {
            Ok(value) => {
                self.failures.remove(&id);
                self.values.insert(id, value);
            }
            Err(failure) => {
                self.values.remove(&id);
                self.failures.insert(id, failure);
            }
        }
    }

    /// True iff at least one unit succeeded.
    pub fn is_success(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.values.get(id)
    }

    pub fn values(&self) -> &BTreeMap<String, V> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<String, V> {
        self.values
    }

    /// Number of units that contributed nothing.
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &BTreeMap<String, UnitFailure> {
        &self.failures
    }

    /// Convert every value, moving conversion failures to `failures`.
    pub fn try_map<U, F>(self, mut f: F) -> AggregateResult<U>
    where
        F: FnMut(&str, V) -> UnitResult<U>,
    {
        let mut mapped = AggregateResult {
            values: BTreeMap::new(),
            failures: self.failures,
        };
        for (id, value) in self.values {
            let result = f(&id, value);
            mapped.record(id, result);
        }
        mapped
    }

    /// Replace each value with its own keyed entries, e.g. one table unit
    /// becoming one entry per symbol.
    ///
    /// A unit that expands to nothing is counted as failed.
    pub fn flatten<U, F>(self, mut f: F) -> AggregateResult<U>
    where
        F: FnMut(&str, V) -> UnitResult<BTreeMap<String, U>>,
    {
        let mut flattened = AggregateResult {
            values: BTreeMap::new(),
            failures: self.failures,
        };
        for (id, value) in self.values {
            match f(&id, value) {
                Ok(entries) if !entries.is_empty() => flattened.values.extend(entries),
                Ok(_) => {
                    flattened
                        .failures
                        .insert(id, UnitFailure::Extraction("no entries".to_string()));
                }
                Err(failure) => {
                    flattened.failures.insert(id, failure);
                }
            }
        }
        flattened
    }
}

impl<V> Default for AggregateResult<V> {
    fn default() -> Self {
        Self::new()
    }
}
