//! Market-data subscription handlers.
//!
//! Subscriptions are room memberships: `market.subscribe` swaps the
//! session's market rooms for the requested set, so a session is only
//! ever in the rooms of its latest request.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{decode_request, GatewayError, HandlerResult};
use crate::rooms::market_room;
use crate::session::Session;
use crate::simulator::available_symbols;
use crate::state::GatewayState;

/// Session field holding the current market room set.
const SUBSCRIBED_ROOMS_FIELD: &str = "subscribedRooms";

#[derive(Debug, Deserialize)]
struct SymbolsRequest {
    #[serde(default)]
    symbols: Vec<String>,
}

/// `market.subscribe` - replaces the session's market rooms with the
/// requested symbol set.
pub async fn subscribe(
    state: Arc<GatewayState>,
    session: Arc<Session>,
    body: Value,
) -> HandlerResult {
    let request: SymbolsRequest = decode_request(body)?;
    if request.symbols.is_empty() {
        return Err(GatewayError::InvalidParams(
            "symbols list is required".to_string(),
        ));
    }

    let left_rooms = session
        .field_list(SUBSCRIBED_ROOMS_FIELD)
        .unwrap_or_default();
    for room in &left_rooms {
        state.rooms.leave(room, session.id());
    }

    let rooms: Vec<String> = request.symbols.iter().map(|s| market_room(s)).collect();
    for room in &rooms {
        state.rooms.join(room, session.id());
    }
    session.set_field(SUBSCRIBED_ROOMS_FIELD, rooms.clone(), true);

    debug!(session_id = %session.id(), joined = rooms.len(), left = left_rooms.len(), "market subscription updated");
    Ok(json!({
        "subscribed": request.symbols,
        "rooms": rooms,
        "leftRooms": left_rooms,
        "message": "Successfully subscribed to market data",
    }))
}

/// `market.unsubscribe` - leaves the named symbols' rooms.
pub async fn unsubscribe(
    state: Arc<GatewayState>,
    session: Arc<Session>,
    body: Value,
) -> HandlerResult {
    let request: SymbolsRequest = decode_request(body)?;

    let rooms: Vec<String> = request.symbols.iter().map(|s| market_room(s)).collect();
    for room in &rooms {
        state.rooms.leave(room, session.id());
    }

    let remaining: Vec<String> = session
        .field_list(SUBSCRIBED_ROOMS_FIELD)
        .unwrap_or_default()
        .into_iter()
        .filter(|room| !rooms.contains(room))
        .collect();
    session.set_field(SUBSCRIBED_ROOMS_FIELD, remaining, true);

    Ok(json!({
        "unsubscribed": request.symbols,
        "rooms": rooms,
        "message": "Successfully unsubscribed from market data",
    }))
}

/// `market.list` - current subscriptions plus the available universe.
pub async fn list(_state: Arc<GatewayState>, session: Arc<Session>, _body: Value) -> HandlerResult {
    Ok(json!({
        "subscribedRooms": session.field_list(SUBSCRIBED_ROOMS_FIELD).unwrap_or_default(),
        "availableSymbols": available_symbols(),
        "message": "Market data subscription list retrieved from session state",
    }))
}
