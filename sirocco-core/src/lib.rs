//! # Sirocco Core
//!
//! Core domain types for the Sirocco trading gateway.
//!
//! This crate provides:
//! - Order, account, and position value objects
//! - Candle and history-query types for the time-series collaborator
//! - Alert rules and events
//! - Metrics snapshots
//! - The wire-level error code set

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod data;
pub mod error;
pub mod types;

pub use data::{
    Account, AlertEvent, AlertOp, AlertRule, Candle, HistoryQuery, MetricKey, MetricsSnapshot,
    Order, OrderRequest, OrderResult, Position,
};
pub use error::{ErrorCode, ErrorEnvelope};
pub use types::{CandleInterval, OrderId, OrderKind, OrderSide, OrderStatus, Symbol};
