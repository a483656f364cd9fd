//! Account and position value objects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// A trading account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account identifier.
    pub account_id: String,
    /// Owning user id.
    pub owner_user_id: String,
    /// Settlement currency.
    pub base_currency: String,
    /// Free balance in the base currency.
    pub balance: Decimal,
}

/// An open position on a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Instrument.
    pub symbol: Symbol,
    /// Signed quantity (negative for shorts).
    pub qty: Decimal,
    /// Average entry price.
    pub avg_price: Decimal,
}
