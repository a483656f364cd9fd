//! Primitive domain types.
//!
//! This module provides the small value types shared across the gateway:
//! - [`Symbol`] - Instrument identifier
//! - [`OrderId`] - Process-monotonic order identifier
//! - [`OrderSide`], [`OrderKind`], [`OrderStatus`] - Order enums
//! - [`CandleInterval`] - Candle bucket widths

pub mod interval;
pub mod order_id;
pub mod symbol;

pub use interval::CandleInterval;
pub use order_id::OrderId;
pub use symbol::Symbol;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side - buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order (long)
    Buy,
    /// Sell order (short)
    Sell,
}

impl OrderSide {
    /// Returns true if this is a buy order.
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    /// Returns true if this is a sell order.
    #[must_use]
    pub const fn is_sell(&self) -> bool {
        matches!(self, Self::Sell)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind - how the order executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Executes at the specified price or better.
    Limit,
    /// Executes immediately at the best available price.
    Market,
}

impl OrderKind {
    /// Returns true if this kind requires an explicit price.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(self, Self::Limit)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Order status - current state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted by the gateway, not yet acknowledged downstream.
    New,
    /// Acknowledged, resting.
    Ack,
    /// Partially executed.
    PartiallyFilled,
    /// Fully executed.
    Filled,
    /// Refused by risk validation.
    Rejected,
    /// Cancelled by the client.
    Canceled,
}

impl OrderStatus {
    /// Returns true if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Rejected | Self::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Ack => write!(f, "ACK"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_serde() {
        let json = serde_json::to_string(&OrderSide::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
        let side: OrderSide = serde_json::from_str("\"SELL\"").unwrap();
        assert!(side.is_sell());
    }

    #[test]
    fn test_order_kind_requires_price() {
        assert!(OrderKind::Limit.requires_price());
        assert!(!OrderKind::Market.requires_price());
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Ack.is_terminal());
    }

    #[test]
    fn test_status_display_matches_wire() {
        assert_eq!(OrderStatus::Canceled.to_string(), "CANCELED");
        assert_eq!(
            serde_json::to_string(&OrderStatus::Canceled).unwrap(),
            "\"CANCELED\""
        );
    }
}
