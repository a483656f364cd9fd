//! Order value objects.
//!
//! This module provides:
//! - [`OrderRequest`] - the decoded `orders.place` payload
//! - [`Order`] - an order as carried to the risk validator
//! - [`OrderResult`] - the outcome cached under the idempotency key

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, OrderKind, OrderSide, OrderStatus, Symbol};

/// A client request to place an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Client-supplied idempotency key.
    pub idempotency_key: String,
    /// Instrument to trade.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: OrderSide,
    /// Limit or market.
    #[serde(rename = "type")]
    pub kind: OrderKind,
    /// Quantity in base units.
    pub qty: Decimal,
    /// Limit price (also used as the reference price for market orders).
    pub price: Decimal,
}

/// An order instance carried to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Gateway-assigned id.
    pub order_id: OrderId,
    /// Client-supplied idempotency key.
    pub idempotency_key: String,
    /// Instrument.
    pub symbol: Symbol,
    /// Limit or market.
    pub kind: OrderKind,
    /// Buy or sell.
    pub side: OrderSide,
    /// Quantity in base units.
    pub qty: Decimal,
    /// Price in quote units.
    pub price: Decimal,
    /// Current status.
    pub status: OrderStatus,
    /// Creation time, unix milliseconds.
    pub created_at: i64,
}

impl Order {
    /// Builds a new order in `NEW` status from a request.
    #[must_use]
    pub fn from_request(order_id: OrderId, request: &OrderRequest) -> Self {
        Self {
            order_id,
            idempotency_key: request.idempotency_key.clone(),
            symbol: request.symbol.clone(),
            kind: request.kind,
            side: request.side,
            qty: request.qty,
            price: request.price,
            status: OrderStatus::New,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Returns the order notional in quote units.
    ///
    /// Market orders carry a 10% buffer since the execution price is not
    /// known at validation time.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        let base = self.qty * self.price;
        match self.kind {
            OrderKind::Market => base * Decimal::new(11, 1),
            OrderKind::Limit => base,
        }
    }
}

/// The outcome of an order operation.
///
/// This record is what the idempotency cache stores: replays of the same
/// key must observe a byte-identical result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    /// Final status (`ACK`, `FILLED`, `REJECTED`, `CANCELED`).
    pub status: OrderStatus,
    /// Gateway-assigned order id.
    pub order_id: String,
    /// Echo of the client's idempotency key.
    pub echo_key: String,
    /// Rejection reason, empty otherwise.
    #[serde(default)]
    pub reason: String,
}

impl OrderResult {
    /// Creates a result without a reason.
    #[must_use]
    pub fn new(status: OrderStatus, order_id: impl Into<String>, echo_key: impl Into<String>) -> Self {
        Self {
            status,
            order_id: order_id.into(),
            echo_key: echo_key.into(),
            reason: String::new(),
        }
    }

    /// Creates a rejected result with a reason.
    #[must_use]
    pub fn rejected(
        order_id: impl Into<String>,
        echo_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: OrderStatus::Rejected,
            order_id: order_id.into(),
            echo_key: echo_key.into(),
            reason: reason.into(),
        }
    }
}
