//! Alert rules and events.
//!
//! An [`AlertRule`] compares one metric against a threshold; the alert
//! engine evaluates every enabled rule against each metrics snapshot and
//! emits an [`AlertEvent`] per firing rule.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::metrics::MetricsSnapshot;

/// The metric a rule observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKey {
    /// Request latency in milliseconds.
    #[serde(rename = "latencyMs")]
    LatencyMs,
    /// Orders per second.
    #[serde(rename = "throughput")]
    Throughput,
    /// Errors over total operations.
    #[serde(rename = "errorRate")]
    ErrorRate,
    /// Connected transports.
    #[serde(rename = "connCount")]
    ConnCount,
}

impl MetricKey {
    /// Extracts this metric's value from a snapshot.
    #[must_use]
    pub fn sample(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self {
            Self::LatencyMs => snapshot.latency_ms,
            Self::Throughput => snapshot.throughput,
            Self::ErrorRate => snapshot.error_rate,
            Self::ConnCount => f64::from(snapshot.conn_count),
        }
    }

    /// Human-readable name used in alert messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::LatencyMs => "latency",
            Self::Throughput => "throughput",
            Self::ErrorRate => "error rate",
            Self::ConnCount => "connection count",
        }
    }
}

/// Comparison operator for alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertOp {
    /// Strictly greater.
    #[serde(rename = ">")]
    Gt,
    /// Greater or equal.
    #[serde(rename = ">=")]
    Ge,
    /// Strictly less.
    #[serde(rename = "<")]
    Lt,
    /// Less or equal.
    #[serde(rename = "<=")]
    Le,
    /// Exactly equal.
    #[serde(rename = "==")]
    Eq,
}

impl AlertOp {
    /// Applies the comparison.
    #[must_use]
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Ge => value >= threshold,
            Self::Lt => value < threshold,
            Self::Le => value <= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
        }
    }
}

impl fmt::Display for AlertOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
        };
        f.write_str(s)
    }
}

/// A registered alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Rule identifier; re-registering the same id replaces the rule.
    pub rule_id: String,
    /// Metric observed.
    pub metric_key: MetricKey,
    /// Comparison operator.
    #[serde(rename = "operator")]
    pub op: AlertOp,
    /// Threshold value.
    pub threshold: f64,
    /// Disabled rules are retained but never fire.
    pub enabled: bool,
}

impl AlertRule {
    /// Evaluates the rule against a snapshot, returning an event if it fires.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Option<AlertEvent> {
        if !self.enabled {
            return None;
        }
        let value = self.metric_key.sample(snapshot);
        if !self.op.compare(value, self.threshold) {
            return None;
        }
        Some(AlertEvent {
            event_id: format!("{}_{}", self.rule_id, snapshot.ts),
            rule_id: self.rule_id.clone(),
            ts: snapshot.ts,
            value,
            message: format!(
                "{} {} {} (current: {})",
                self.metric_key.label(),
                self.op,
                self.threshold,
                value
            ),
        })
    }
}

/// A single firing of an alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Unique event id.
    pub event_id: String,
    /// The rule that fired.
    pub rule_id: String,
    /// Evaluation time, unix milliseconds.
    pub ts: i64,
    /// Metric value at evaluation.
    pub value: f64,
    /// Human-readable description.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            ts: 1_700_000_000_000,
            latency_ms: 120.0,
            throughput: 1.5,
            error_rate: 0.0,
            conn_count: 7,
        }
    }

    fn rule(metric_key: MetricKey, op: AlertOp, threshold: f64) -> AlertRule {
        AlertRule {
            rule_id: "r1".to_string(),
            metric_key,
            op,
            threshold,
            enabled: true,
        }
    }

    #[test]
    fn test_rule_fires() {
        let event = rule(MetricKey::LatencyMs, AlertOp::Gt, 100.0)
            .evaluate(&snapshot())
            .unwrap();
        assert_eq!(event.rule_id, "r1");
        assert!((event.value - 120.0).abs() < f64::EPSILON);
        assert!(event.message.contains("latency > 100"));
    }

    #[test]
    fn test_rule_below_threshold() {
        assert!(rule(MetricKey::Throughput, AlertOp::Gt, 2.0)
            .evaluate(&snapshot())
            .is_none());
    }

    #[test]
    fn test_disabled_rule_never_fires() {
        let mut rule = rule(MetricKey::LatencyMs, AlertOp::Gt, 100.0);
        rule.enabled = false;
        assert!(rule.evaluate(&snapshot()).is_none());
    }

    #[test]
    fn test_operator_wire_form() {
        let json = r#"{"ruleId":"r2","metricKey":"errorRate","operator":">=","threshold":0.05,"enabled":true}"#;
        let rule: AlertRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.op, AlertOp::Ge);
        assert_eq!(rule.metric_key, MetricKey::ErrorRate);
    }

    #[test]
    fn test_conn_count_sampled_as_float() {
        let event = rule(MetricKey::ConnCount, AlertOp::Ge, 7.0)
            .evaluate(&snapshot())
            .unwrap();
        assert!((event.value - 7.0).abs() < f64::EPSILON);
    }
}
