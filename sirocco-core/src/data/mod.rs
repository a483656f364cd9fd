//! Domain data structures.
//!
//! Value records carried between the gateway and its collaborators:
//! orders, accounts, candles, alerts, and metrics snapshots.

pub mod account;
pub mod alert;
pub mod candle;
pub mod metrics;
pub mod order;

pub use account::{Account, Position};
pub use alert::{AlertEvent, AlertOp, AlertRule, MetricKey};
pub use candle::{Candle, HistoryQuery};
pub use metrics::MetricsSnapshot;
pub use order::{Order, OrderRequest, OrderResult};
