//! External collaborator seams.
//!
//! The gateway treats the time-series store, the order log, and the risk
//! validator as external collaborators. Each role is one small capability
//! trait, injected at server construction; this module also carries
//! in-memory demo implementations so the binary runs standalone.

pub mod history;
pub mod order_log;
pub mod risk;

pub use history::{HistoryRepository, MemoryHistoryRepository};
pub use order_log::{MemoryOrderLog, OrderLog, OrderRecord};
pub use risk::{NotionalRiskValidator, RiskValidator};

use rust_decimal::Decimal;
use thiserror::Error;

use sirocco_core::{Account, Position};

/// Collaborator failure.
#[derive(Debug, Clone, Error)]
pub enum CollabError {
    /// The collaborator is not reachable at all.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator is reachable but the operation failed.
    #[error("collaborator query failed: {0}")]
    Query(String),
}

/// Returns the demo account for a user.
///
/// The account collaborator is out of scope; every user gets a
/// deterministic USD account with a 100k balance.
#[must_use]
pub fn account_for(user_id: &str) -> Account {
    Account {
        account_id: format!("ACC_{user_id}"),
        owner_user_id: user_id.to_string(),
        base_currency: "USD".to_string(),
        balance: Decimal::new(100_000, 0),
    }
}

/// Returns the open positions for an account.
#[must_use]
pub fn positions_for(_account: &Account) -> Vec<Position> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_account_shape() {
        let account = account_for("trader-user-123");
        assert_eq!(account.account_id, "ACC_trader-user-123");
        assert_eq!(account.balance, Decimal::new(100_000, 0));
        assert!(positions_for(&account).is_empty());
    }
}
