//! History repository seam.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use sirocco_core::{Candle, HistoryQuery, Symbol};

use super::CollabError;

/// Time-series candle store.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Fetches candles for a symbol over a time range.
    async fn fetch(&self, symbol: &Symbol, query: &HistoryQuery) -> Result<Vec<Candle>, CollabError>;

    /// Returns the most recent candle per symbol.
    async fn latest(
        &self,
        symbols: &[Symbol],
        limit: u32,
    ) -> Result<Vec<(Symbol, Candle)>, CollabError>;
}

/// In-memory demo repository producing deterministic synthetic candles.
///
/// Prices oscillate around each symbol's base price so repeated queries
/// over the same range return identical data.
#[derive(Debug, Default)]
pub struct MemoryHistoryRepository {
    symbols: Vec<(Symbol, f64)>,
}

impl MemoryHistoryRepository {
    /// Creates a repository serving the given symbols at base prices.
    #[must_use]
    pub fn new(symbols: Vec<(Symbol, f64)>) -> Self {
        Self { symbols }
    }

    fn base_price(&self, symbol: &Symbol) -> Option<f64> {
        self.symbols
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, price)| *price)
    }

    fn candle_at(symbol: &Symbol, base: f64, open_time_s: i64, query: &HistoryQuery) -> Candle {
        let mut hasher = DefaultHasher::new();
        symbol.as_str().hash(&mut hasher);
        open_time_s.hash(&mut hasher);
        // Deterministic wobble in roughly +/-0.4% of the base price.
        let wobble = (hasher.finish() % 80) as f64 / 10_000.0 - 0.004;

        let open = base * (1.0 + wobble);
        let close = base * (1.0 - wobble / 2.0);
        Candle {
            open_time: open_time_s * 1000,
            open,
            high: open.max(close) * 1.001,
            low: open.min(close) * 0.999,
            close,
            volume: 1_000 + hasher.finish() % 50_000,
            interval: query.interval,
        }
    }
}

#[async_trait]
impl HistoryRepository for MemoryHistoryRepository {
    async fn fetch(
        &self,
        symbol: &Symbol,
        query: &HistoryQuery,
    ) -> Result<Vec<Candle>, CollabError> {
        let base = self
            .base_price(symbol)
            .ok_or_else(|| CollabError::Query(format!("unknown symbol: {symbol}")))?;

        let step = query.interval.seconds();
        let mut candles = Vec::new();
        let mut open_time = query.from_ts - query.from_ts.rem_euclid(step);
        while open_time <= query.to_ts && candles.len() < query.limit as usize {
            candles.push(Self::candle_at(symbol, base, open_time, query));
            open_time += step;
        }
        Ok(candles)
    }

    async fn latest(
        &self,
        symbols: &[Symbol],
        limit: u32,
    ) -> Result<Vec<(Symbol, Candle)>, CollabError> {
        let now_s = chrono::Utc::now().timestamp();
        let query = HistoryQuery::new(now_s - 60, now_s, sirocco_core::CandleInterval::M1, 1);

        let mut latest = Vec::new();
        for symbol in symbols.iter().take(limit as usize) {
            if let Some(base) = self.base_price(symbol) {
                latest.push((
                    symbol.clone(),
                    Self::candle_at(symbol, base, now_s - now_s.rem_euclid(60), &query),
                ));
            }
        }
        Ok(latest)
    }
}
