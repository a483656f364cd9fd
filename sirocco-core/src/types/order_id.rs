//! Order identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A gateway-assigned order identifier.
///
/// Minted ids are unique and monotonic for the lifetime of the process:
/// `ORD_<unix_ms>_<counter>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Mints a fresh, process-monotonic order id.
    #[must_use]
    pub fn mint() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let now_ms = chrono::Utc::now().timestamp_millis();
        Self(format!("ORD_{now_ms}_{seq}"))
    }

    /// Wraps an existing id (for replay from the order log).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_unique() {
        let a = OrderId::mint();
        let b = OrderId::mint();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mint_prefix() {
        assert!(OrderId::mint().as_str().starts_with("ORD_"));
    }
}
