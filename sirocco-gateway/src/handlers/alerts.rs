//! Alert handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use sirocco_core::{AlertOp, AlertRule, MetricKey};

use crate::alerts::{broadcast_alerts, builtin_statuses, firing_alerts};
use crate::error::{decode_request, GatewayError, HandlerResult};
use crate::rooms::ALERTS_ROOM;
use crate::session::Session;
use crate::state::GatewayState;

/// `alerts.subscribe` - joins the system alerts room.
pub async fn subscribe(
    state: Arc<GatewayState>,
    session: Arc<Session>,
    _body: Value,
) -> HandlerResult {
    state.rooms.join(ALERTS_ROOM, session.id());
    Ok(json!({
        "room": ALERTS_ROOM,
        "message": "Successfully subscribed to alerts",
    }))
}

/// `alerts.list` - evaluates built-ins and registered rules against the
/// current snapshot, broadcasting when any fire.
pub async fn list(state: Arc<GatewayState>, _session: Arc<Session>, _body: Value) -> HandlerResult {
    let snapshot = state.metrics.snapshot();
    let statuses = builtin_statuses(&snapshot);
    let events = state.alerts.evaluate(&snapshot);

    let firing = firing_alerts(&state.alerts, &snapshot);
    if !firing.is_empty() {
        broadcast_alerts(
            &state,
            json!({
                "type": "alert_status_change",
                "alerts": Value::Object(firing),
                "timestamp": snapshot.ts,
                "message": "System alert status changed",
            }),
        )
        .await;
    }

    Ok(json!({
        "alerts": statuses,
        "alertEvents": events,
        "timestamp": snapshot.ts,
        "message": "Real-time system alerts with current metrics",
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    rule_id: String,
    metric_key: Option<MetricKey>,
    operator: Option<AlertOp>,
    #[serde(default)]
    threshold: f64,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// `alerts.register` - inserts or replaces a rule.
pub async fn register(
    state: Arc<GatewayState>,
    _session: Arc<Session>,
    body: Value,
) -> HandlerResult {
    let request: RegisterRequest = decode_request(body)?;
    let (Some(metric_key), Some(operator)) = (request.metric_key, request.operator) else {
        return Err(GatewayError::InvalidParams(
            "missing required parameters: ruleId, metricKey, operator".to_string(),
        ));
    };
    if request.rule_id.is_empty() {
        return Err(GatewayError::InvalidParams(
            "missing required parameters: ruleId, metricKey, operator".to_string(),
        ));
    }

    let rule = AlertRule {
        rule_id: request.rule_id,
        metric_key,
        op: operator,
        threshold: request.threshold,
        enabled: request.enabled,
    };
    state.alerts.register(rule.clone());

    Ok(json!({
        "ruleId": rule.rule_id,
        "metricKey": rule.metric_key,
        "operator": rule.op,
        "threshold": rule.threshold,
        "enabled": rule.enabled,
        "message": "Alert rule registered successfully",
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisableRequest {
    #[serde(default)]
    rule_id: String,
}

/// `alerts.disable` - disables a rule, preserving its history.
pub async fn disable(
    state: Arc<GatewayState>,
    _session: Arc<Session>,
    body: Value,
) -> HandlerResult {
    let request: DisableRequest = decode_request(body)?;
    if request.rule_id.is_empty() {
        return Err(GatewayError::InvalidParams(
            "missing required parameter: ruleId".to_string(),
        ));
    }

    state.alerts.disable(&request.rule_id);
    Ok(json!({
        "ruleId": request.rule_id,
        "message": "Alert rule disabled successfully",
    }))
}
