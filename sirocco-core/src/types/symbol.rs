//! Instrument symbol type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An instrument identifier such as `BTC-USD`.
///
/// Symbols are opaque, case-preserving strings; the gateway never
/// interprets their structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a symbol from anything string-like.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the symbol code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the symbol is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for Symbol {
    fn from(code: String) -> Self {
        Self(code)
    }
}
