//! Metrics handler.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::HandlerResult;
use crate::session::Session;
use crate::state::GatewayState;

/// `metrics.get` - derived snapshot plus raw totals and uptime.
#[allow(clippy::cast_possible_truncation)]
pub async fn get(state: Arc<GatewayState>, _session: Arc<Session>, _body: Value) -> HandlerResult {
    let snapshot = state.metrics.snapshot();
    Ok(json!({
        "ts": snapshot.ts,
        "uptimeMs": state.metrics.uptime().as_millis() as u64,
        "latencyMs": snapshot.latency_ms,
        "throughput": snapshot.throughput,
        "errorRate": snapshot.error_rate,
        "connCount": snapshot.conn_count,
        "totalOrders": state.metrics.orders_placed(),
        "totalCancels": state.metrics.orders_cancelled(),
        "totalErrors": state.metrics.errors(),
        "activeSessions": state.sessions.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClientIdentity, SessionToken};

    #[tokio::test]
    async fn test_metrics_shape() {
        let state = Arc::new(GatewayState::for_tests());
        let (session, _) = state.sessions.bind(ClientIdentity {
            client_id: "c1".to_string(),
            device_id: 1,
            session_token: SessionToken([2; 16]),
        });

        state.metrics.record_order_placed();
        state.metrics.record_error();

        let response = get(state, session, Value::Null).await.unwrap();
        assert_eq!(response["totalOrders"], 1);
        assert_eq!(response["totalErrors"], 1);
        assert_eq!(response["activeSessions"], 1);
        assert!(response["latencyMs"].as_f64().unwrap() > 0.0);
        // One placed order, one error, zero cancels: rate is 1.0.
        assert!((response["errorRate"].as_f64().unwrap() - 1.0).abs() < f64::EPSILON);
    }
}
