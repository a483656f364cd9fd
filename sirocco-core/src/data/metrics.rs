//! Metrics snapshot type.

use serde::{Deserialize, Serialize};

/// A point-in-time view of the gateway's operational metrics.
///
/// Derived from the process-wide counters at sample time; alert rules are
/// evaluated against this snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Sample time, unix milliseconds.
    pub ts: i64,
    /// Estimated request latency in milliseconds.
    pub latency_ms: f64,
    /// Orders placed per second of uptime.
    pub throughput: f64,
    /// Errors over total order operations, `0.0` when none.
    pub error_rate: f64,
    /// Currently connected transports.
    pub conn_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_names() {
        let snapshot = MetricsSnapshot {
            ts: 1,
            latency_ms: 0.5,
            throughput: 2.0,
            error_rate: 0.0,
            conn_count: 3,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("latencyMs"));
        assert!(json.contains("errorRate"));
        assert!(json.contains("connCount"));
    }
}
