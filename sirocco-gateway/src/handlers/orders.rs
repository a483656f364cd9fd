//! Order management handlers.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use sirocco_core::{Order, OrderId, OrderKind, OrderRequest, OrderResult, OrderStatus};

use crate::alerts;
use crate::collab::{account_for, positions_for, OrderLog};
use crate::error::{decode_request, GatewayError, HandlerResult};
use crate::idempotency::Begin;
use crate::session::Session;
use crate::state::GatewayState;

/// `orders.place` - idempotent order placement with risk validation.
///
/// Replays of a cached idempotency key return the prior result verbatim;
/// a fresh key mints an order, runs the risk validator, and caches the
/// outcome. `MARKET` orders fill immediately, `LIMIT` orders rest as
/// `ACK`.
pub async fn place(state: Arc<GatewayState>, session: Arc<Session>, body: Value) -> HandlerResult {
    let request: OrderRequest = decode_request(body)?;
    validate_place(&request)?;

    let ttl = state.idempotency.default_ttl();
    let slot = match state.idempotency.begin(&request.idempotency_key).await {
        Begin::Hit(result) => {
            info!(key = %request.idempotency_key, order_id = %result.order_id, "replayed cached order result");
            return Ok(place_response(&result, &request, &session));
        }
        Begin::Owner(slot) => slot,
    };

    let order = Order::from_request(OrderId::mint(), &request);
    let user_id = session
        .field_str("userId")
        .unwrap_or_else(|| "demo-user".to_string());
    let account = account_for(&user_id);
    let positions = positions_for(&account);

    if let Err(reason) = state.risk.validate(&account, &positions, &order) {
        let result = OrderResult::rejected(order.order_id.as_str(), &request.idempotency_key, reason);
        slot.complete(result.clone(), ttl);
        info!(order_id = %result.order_id, reason = %result.reason, "order rejected by risk");
        return Ok(place_response(&result, &request, &session));
    }

    let status = match request.kind {
        OrderKind::Market => OrderStatus::Filled,
        OrderKind::Limit => OrderStatus::Ack,
    };
    let result = OrderResult::new(status, order.order_id.as_str(), &request.idempotency_key);
    slot.complete(result.clone(), ttl);

    let detail = json!({
        "orderId": result.order_id,
        "symbol": request.symbol,
        "side": request.side,
        "type": request.kind,
        "quantity": request.qty,
        "price": request.price,
        "status": status,
        "sessionId": session.id().to_string(),
        "timestamp": order.created_at,
    });
    append_with_retry(
        state.order_log.as_ref(),
        &request.idempotency_key,
        status,
        &result.order_id,
        detail,
    )
    .await;

    session.set_field("lastOrderId", result.order_id.clone(), true);
    session.set_field("lastOrderStatus", status.to_string(), true);

    state.metrics.record_order_placed();
    alerts::check_and_broadcast(&state).await;

    info!(order_id = %result.order_id, status = %status, "order placed");
    Ok(place_response(&result, &request, &session))
}

fn validate_place(request: &OrderRequest) -> Result<(), GatewayError> {
    if request.idempotency_key.is_empty() {
        return Err(GatewayError::InvalidParams(
            "idempotencyKey is required".to_string(),
        ));
    }
    if request.symbol.is_empty() {
        return Err(GatewayError::InvalidParams("symbol is required".to_string()));
    }
    if request.qty <= Decimal::ZERO {
        return Err(GatewayError::InvalidParams(
            "qty must be positive".to_string(),
        ));
    }
    if request.price <= Decimal::ZERO {
        return Err(GatewayError::InvalidParams(
            "price must be positive".to_string(),
        ));
    }
    Ok(())
}

fn place_response(result: &OrderResult, request: &OrderRequest, session: &Session) -> Value {
    json!({
        "status": result.status,
        "orderId": result.order_id,
        "echoKey": result.echo_key,
        "reason": result.reason,
        "sessionId": session.id().to_string(),
        "symbol": request.symbol,
        "side": request.side,
        "type": request.kind,
        "price": request.price,
        "quantity": request.qty,
        "idempotencyKey": request.idempotency_key,
    })
}

/// Fire-and-forget append with a single retry.
async fn append_with_retry(
    log: &dyn OrderLog,
    key: &str,
    status: OrderStatus,
    order_id: &str,
    detail: Value,
) {
    if let Err(e) = log.append(key, status, order_id, detail.clone()).await {
        warn!(key, error = %e, "order log append failed, retrying once");
        if let Err(e) = log.append(key, status, order_id, detail).await {
            warn!(key, error = %e, "order log append retry failed");
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest {
    #[serde(default)]
    order_id: String,
}

/// `orders.cancel` - logs a cancellation record for the order.
pub async fn cancel(state: Arc<GatewayState>, session: Arc<Session>, body: Value) -> HandlerResult {
    let request: CancelRequest = decode_request(body)?;
    if request.order_id.is_empty() {
        return Err(GatewayError::InvalidParams("missing orderId".to_string()));
    }

    // Preserve the original order details in the cancellation record when
    // the log still has them.
    let prior = state
        .order_log
        .get_by_order_id(&request.order_id)
        .await
        .ok()
        .flatten();
    let mut detail = prior.map(|r| r.detail).unwrap_or_else(|| json!({}));
    if let Some(map) = detail.as_object_mut() {
        map.insert("orderId".to_string(), json!(request.order_id));
        map.insert("status".to_string(), json!(OrderStatus::Canceled));
        map.insert("sessionId".to_string(), json!(session.id().to_string()));
        map.insert(
            "cancelledAt".to_string(),
            json!(chrono::Utc::now().timestamp_millis()),
        );
    }

    let cancel_key = format!("CANCEL_{}", request.order_id);
    append_with_retry(
        state.order_log.as_ref(),
        &cancel_key,
        OrderStatus::Canceled,
        &request.order_id,
        detail,
    )
    .await;

    state.metrics.record_order_cancelled();
    alerts::check_and_broadcast(&state).await;

    info!(order_id = %request.order_id, "order cancelled");
    Ok(json!({
        "status": OrderStatus::Canceled,
        "orderId": request.order_id,
        "message": "Order canceled successfully",
    }))
}

/// `orders.status` - last-known order id/status from session state.
pub async fn status(_state: Arc<GatewayState>, session: Arc<Session>, _body: Value) -> HandlerResult {
    Ok(json!({
        "lastOrderId": session.field_str("lastOrderId").unwrap_or_else(|| "none".to_string()),
        "lastOrderStatus": session.field_str("lastOrderStatus").unwrap_or_else(|| "none".to_string()),
        "message": "Order status retrieved from session state",
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrdersHistoryRequest {
    #[serde(default)]
    from_time: Option<i64>,
    #[serde(default)]
    to_time: Option<i64>,
    #[serde(default = "default_history_limit")]
    limit: u32,
}

fn default_history_limit() -> u32 {
    100
}

/// `orders.history` - latest status per order id, newest first.
pub async fn history(state: Arc<GatewayState>, _session: Arc<Session>, body: Value) -> HandlerResult {
    let request: OrdersHistoryRequest = decode_request(body)?;
    let limit = request.limit.min(1000);

    let records = state
        .order_log
        .latest_per_order(request.from_time, request.to_time, limit)
        .await?;

    Ok(json!({
        "success": true,
        "count": records.len(),
        "orders": records,
        "message": "Order history retrieved successfully",
    }))
}
