//! Candle and history-query types.

use serde::{Deserialize, Serialize};

use crate::types::CandleInterval;

/// An OHLCV sample over a fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// Bucket open time, unix milliseconds.
    pub open_time: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume in base units.
    pub volume: u64,
    /// Bucket width.
    pub interval: CandleInterval,
}

/// A range query against the history repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Range start, unix seconds inclusive.
    pub from_ts: i64,
    /// Range end, unix seconds inclusive.
    pub to_ts: i64,
    /// Candle bucket width.
    pub interval: CandleInterval,
    /// Maximum number of candles returned.
    pub limit: u32,
}

impl HistoryQuery {
    /// The hard cap applied to `limit` regardless of what the client asks.
    pub const MAX_LIMIT: u32 = 1000;

    /// Creates a query with the limit clamped to [`Self::MAX_LIMIT`].
    #[must_use]
    pub fn new(from_ts: i64, to_ts: i64, interval: CandleInterval, limit: u32) -> Self {
        Self {
            from_ts,
            to_ts,
            interval,
            limit: limit.min(Self::MAX_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_clamps_limit() {
        let query = HistoryQuery::new(0, 100, CandleInterval::M1, 50_000);
        assert_eq!(query.limit, HistoryQuery::MAX_LIMIT);
    }

    #[test]
    fn test_candle_wire_names() {
        let candle = Candle {
            open_time: 1_700_000_000_000,
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 1234,
            interval: CandleInterval::M1,
        };
        let json = serde_json::to_string(&candle).unwrap();
        assert!(json.contains("openTime"));
    }
}
