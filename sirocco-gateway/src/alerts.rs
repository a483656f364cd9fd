//! Alert engine.
//!
//! A mutex-guarded rule store plus an evaluator. Evaluation runs whenever
//! the order or error counters change and on explicit `alerts.list`;
//! firing rules broadcast into the `alerts:system` room.

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use sirocco_core::{AlertEvent, AlertRule, MetricsSnapshot};

use crate::protocol::Frame;
use crate::rooms::ALERTS_ROOM;
use crate::state::GatewayState;

/// Method name of alert push frames.
pub const ALERT_PUSH_METHOD: &str = "alerts.push";

/// Built-in threshold: latency above this fires `high_latency`.
pub const LATENCY_THRESHOLD_MS: f64 = 100.0;
/// Built-in threshold: error rate above this fires `error_rate`.
pub const ERROR_RATE_THRESHOLD: f64 = 0.01;
/// Built-in threshold: connections above this fire `connection_count`.
pub const CONN_COUNT_THRESHOLD: f64 = 1000.0;
/// Built-in threshold: throughput above this fires `high_throughput`.
pub const THROUGHPUT_THRESHOLD: f64 = 2.0;

/// Rule store and evaluator.
#[derive(Debug, Default)]
pub struct AlertEngine {
    rules: Mutex<HashMap<String, AlertRule>>,
}

impl AlertEngine {
    /// Creates an engine with no registered rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a rule.
    pub fn register(&self, rule: AlertRule) {
        info!(rule_id = %rule.rule_id, metric = ?rule.metric_key, threshold = rule.threshold, "alert rule registered");
        self.rules.lock().insert(rule.rule_id.clone(), rule);
    }

    /// Disables a rule, preserving it for history.
    ///
    /// Returns false if no such rule exists.
    pub fn disable(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.lock();
        match rules.get_mut(rule_id) {
            Some(rule) => {
                rule.enabled = false;
                info!(rule_id, "alert rule disabled");
                true
            }
            None => {
                warn!(rule_id, "disable requested for unknown rule");
                false
            }
        }
    }

    /// A point-in-time copy of all rules.
    #[must_use]
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.lock().values().cloned().collect()
    }

    /// Evaluates every enabled registered rule against a snapshot.
    ///
    /// Each firing rule produces exactly one event per evaluation cycle.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<AlertEvent> {
        let rules = self.rules.lock().values().cloned().collect::<Vec<_>>();
        rules
            .iter()
            .filter_map(|rule| rule.evaluate(snapshot))
            .collect()
    }
}

/// Evaluates the built-in thresholds, returning per-alert status objects.
#[must_use]
pub fn builtin_statuses(snapshot: &MetricsSnapshot) -> Map<String, Value> {
    let mut statuses = Map::new();

    let checks: [(&str, f64, f64, String); 4] = [
        (
            "high_latency",
            snapshot.latency_ms,
            LATENCY_THRESHOLD_MS,
            format!("latency {:.2}ms", snapshot.latency_ms),
        ),
        (
            "error_rate",
            snapshot.error_rate,
            ERROR_RATE_THRESHOLD,
            format!("error rate {:.2}%", snapshot.error_rate * 100.0),
        ),
        (
            "connection_count",
            f64::from(snapshot.conn_count),
            CONN_COUNT_THRESHOLD,
            format!("{} connections", snapshot.conn_count),
        ),
        (
            "high_throughput",
            snapshot.throughput,
            THROUGHPUT_THRESHOLD,
            format!("throughput {:.2} orders/sec", snapshot.throughput),
        ),
    ];

    for (name, current, threshold, detail) in checks {
        let firing = current > threshold;
        statuses.insert(
            name.to_string(),
            json!({
                "threshold": threshold,
                "current": current,
                "status": if firing { "alert" } else { "ok" },
                "message": if firing {
                    format!("{name} alert: {detail}")
                } else {
                    format!("{name} ok: {detail}")
                },
            }),
        );
    }
    statuses
}

/// Collects every firing alert (built-in and registered) for a snapshot.
#[must_use]
pub fn firing_alerts(engine: &AlertEngine, snapshot: &MetricsSnapshot) -> Map<String, Value> {
    let mut firing = Map::new();

    for (name, status) in builtin_statuses(snapshot) {
        if status["status"] == "alert" {
            firing.insert(name, status);
        }
    }

    for event in engine.evaluate(snapshot) {
        firing.insert(
            format!("custom_rule_{}", event.rule_id),
            json!({
                "status": "alert",
                "ruleId": event.rule_id,
                "current": event.value,
                "message": event.message,
                "timestamp": event.ts,
            }),
        );
    }
    firing
}

/// Samples the metrics, evaluates all alerts, and broadcasts into the
/// alerts room when any fire.
///
/// Called after every order/error counter change and from `alerts.list`.
pub async fn check_and_broadcast(state: &GatewayState) {
    let snapshot = state.metrics.snapshot();
    let firing = firing_alerts(&state.alerts, &snapshot);
    if firing.is_empty() {
        return;
    }

    debug!(count = firing.len(), "broadcasting firing alerts");
    broadcast_alerts(
        state,
        json!({
            "type": "metrics_alert",
            "alerts": Value::Object(firing),
            "timestamp": snapshot.ts,
            "message": "System metrics triggered alerts",
        }),
    )
    .await;
}

/// Broadcasts an alert payload into the alerts room.
pub async fn broadcast_alerts(state: &GatewayState, payload: Value) {
    let frame = Frame::new(ALERT_PUSH_METHOD, payload);
    match frame.encode() {
        Ok(bytes) => {
            state
                .rooms
                .broadcast(ALERTS_ROOM, bytes, &state.sessions)
                .await;
        }
        Err(e) => warn!(error = %e, "alert frame encode failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sirocco_core::{AlertOp, MetricKey};

    fn snapshot(latency_ms: f64, throughput: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            ts: 1_700_000_000_000,
            latency_ms,
            throughput,
            error_rate: 0.0,
            conn_count: 1,
        }
    }

    fn rule(rule_id: &str, threshold: f64) -> AlertRule {
        AlertRule {
            rule_id: rule_id.to_string(),
            metric_key: MetricKey::LatencyMs,
            op: AlertOp::Gt,
            threshold,
            enabled: true,
        }
    }

    #[test]
    fn test_register_replaces_by_id() {
        let engine = AlertEngine::new();
        engine.register(rule("r1", 50.0));
        engine.register(rule("r1", 75.0));

        let rules = engine.rules();
        assert_eq!(rules.len(), 1);
        assert!((rules[0].threshold - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disable_preserves_rule() {
        let engine = AlertEngine::new();
        engine.register(rule("r1", 50.0));
        assert!(engine.disable("r1"));

        let rules = engine.rules();
        assert_eq!(rules.len(), 1);
        assert!(!rules[0].enabled);
        assert!(engine.evaluate(&snapshot(200.0, 0.0)).is_empty());
    }

    #[test]
    fn test_disable_unknown_rule() {
        let engine = AlertEngine::new();
        assert!(!engine.disable("ghost"));
    }

    #[test]
    fn test_evaluate_fires_once_per_cycle() {
        let engine = AlertEngine::new();
        engine.register(rule("r1", 50.0));

        let events = engine.evaluate(&snapshot(80.0, 0.0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule_id, "r1");
    }

    #[test]
    fn test_builtin_statuses_quiet() {
        let statuses = builtin_statuses(&snapshot(1.0, 0.1));
        assert_eq!(statuses.len(), 4);
        for status in statuses.values() {
            assert_eq!(status["status"], "ok");
        }
    }

    #[test]
    fn test_builtin_high_latency_fires() {
        let statuses = builtin_statuses(&snapshot(150.0, 0.1));
        assert_eq!(statuses["high_latency"]["status"], "alert");
        assert_eq!(statuses["high_throughput"]["status"], "ok");
    }

    #[test]
    fn test_firing_alerts_merges_custom_rules() {
        let engine = AlertEngine::new();
        engine.register(rule("lat", 10.0));

        let firing = firing_alerts(&engine, &snapshot(150.0, 5.0));
        assert!(firing.contains_key("high_latency"));
        assert!(firing.contains_key("high_throughput"));
        assert!(firing.contains_key("custom_rule_lat"));
    }
}
