//! Structured query keys.

use std::collections::BTreeMap;
use std::fmt;

/// Key of one cached view.
///
/// Every page or filter of a logical collection is its own key; keys that
/// share a `collection` are invalidated, snapshotted and patched together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    collection: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    /// Create a key for a collection with no parameters.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// The logical collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The parameters, ordered by name.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Returns `true` if the key belongs to `collection`.
    #[must_use]
    pub fn belongs_to(&self, collection: &str) -> bool {
        self.collection == collection
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.collection)?;
        let mut sep = '?';
        for (name, value) in &self.params {
            write!(f, "{sep}{name}={value}")?;
            sep = '&';
        }
        Ok(())
    }
}
