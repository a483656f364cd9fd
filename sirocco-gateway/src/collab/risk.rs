//! Risk validation.
//!
//! A pure check over account, positions, and the candidate order. The
//! validator refuses orders rather than erroring: a refusal becomes a
//! normal `REJECTED` order result, not an error envelope.

use rust_decimal::Decimal;

use sirocco_core::{Account, Order, OrderSide, Position};

/// Pure order-risk check.
pub trait RiskValidator: Send + Sync {
    /// Validates the order; `Err` carries the rejection reason.
    fn validate(
        &self,
        account: &Account,
        positions: &[Position],
        order: &Order,
    ) -> Result<(), String>;
}

/// Limit-based risk validator.
///
/// Checks, in order: order notional cap, balance coverage for buys, and
/// the absolute position cap. Short selling is allowed.
#[derive(Debug, Clone)]
pub struct NotionalRiskValidator {
    max_order_notional: Decimal,
    max_position_qty: Decimal,
}

impl Default for NotionalRiskValidator {
    fn default() -> Self {
        Self {
            max_order_notional: Decimal::new(100_000, 0),
            max_position_qty: Decimal::new(1_000, 0),
        }
    }
}

impl NotionalRiskValidator {
    /// Creates a validator with explicit limits.
    #[must_use]
    pub fn new(max_order_notional: Decimal, max_position_qty: Decimal) -> Self {
        Self {
            max_order_notional,
            max_position_qty,
        }
    }

    fn current_position(&self, order: &Order, positions: &[Position]) -> Decimal {
        positions
            .iter()
            .find(|p| p.symbol == order.symbol)
            .map_or(Decimal::ZERO, |p| p.qty)
    }
}

impl RiskValidator for NotionalRiskValidator {
    fn validate(
        &self,
        account: &Account,
        positions: &[Position],
        order: &Order,
    ) -> Result<(), String> {
        let notional = order.notional();
        if notional > self.max_order_notional {
            return Err(format!(
                "Order notional limit exceeded. Max notional: ${}",
                self.max_order_notional
            ));
        }

        if order.side == OrderSide::Buy && account.balance < notional {
            return Err(format!(
                "Insufficient balance. Required: ${notional}, Available: ${}",
                account.balance
            ));
        }

        let current = self.current_position(order, positions);
        let resulting = match order.side {
            OrderSide::Buy => current + order.qty,
            OrderSide::Sell => current - order.qty,
        };
        if resulting.abs() > self.max_position_qty {
            return Err(format!(
                "Position limit exceeded. Max position: {}",
                self.max_position_qty
            ));
        }

        Ok(())
    }
}
