//! Historical candle handlers.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use sirocco_core::{CandleInterval, HistoryQuery, Symbol};

use crate::error::{decode_request, GatewayError, HandlerResult};
use crate::session::Session;
use crate::simulator::available_symbols;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQueryRequest {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    from_ts: i64,
    #[serde(default)]
    to_ts: i64,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_interval() -> String {
    "M1".to_string()
}

fn default_limit() -> u32 {
    1000
}

/// `history.query` - candles for a symbol over a millisecond time range.
pub async fn query(state: Arc<GatewayState>, _session: Arc<Session>, body: Value) -> HandlerResult {
    let request: HistoryQueryRequest = decode_request(body)?;

    if request.symbol.is_empty() || request.from_ts <= 0 || request.to_ts <= 0 {
        return Err(GatewayError::InvalidParams(
            "missing required parameters: symbol, fromTs, toTs".to_string(),
        ));
    }
    let interval: CandleInterval = request
        .interval
        .parse()
        .map_err(GatewayError::InvalidParams)?;

    let repository = state.history.as_ref().ok_or_else(|| {
        GatewayError::ServiceUnavailable("history repository not configured".to_string())
    })?;

    // The repository works in seconds; the wire carries milliseconds.
    let from_s = request.from_ts / 1000;
    let to_s = request.to_ts / 1000;
    let history_query = HistoryQuery::new(from_s, to_s, interval, request.limit);

    let symbol = Symbol::new(request.symbol);
    let candles = repository.fetch(&symbol, &history_query).await?;

    Ok(json!({
        "symbol": symbol,
        "count": candles.len(),
        "candles": candles,
        "fromTs": from_s,
        "toTs": to_s,
        "interval": interval.to_string(),
    }))
}

/// `history.latest` - latest close per known symbol.
pub async fn latest(state: Arc<GatewayState>, _session: Arc<Session>, _body: Value) -> HandlerResult {
    let repository = state.history.as_ref().ok_or_else(|| {
        GatewayError::ServiceUnavailable("history repository not configured".to_string())
    })?;

    let symbols: Vec<Symbol> = available_symbols().into_iter().map(Symbol::new).collect();
    let latest = repository
        .latest(&symbols, symbols.len() as u32)
        .await?;

    if latest.is_empty() {
        return Err(GatewayError::NoData(
            "no historical data available".to_string(),
        ));
    }

    let mut prices = Map::new();
    for (symbol, candle) in latest {
        prices.insert(symbol.as_str().to_string(), json!(candle.close));
    }

    Ok(json!({
        "latest": Value::Object(prices),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}
