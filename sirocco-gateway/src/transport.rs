//! Framed WebSocket transport.
//!
//! Accepts long-lived connections, runs the handshake inspector over the
//! upgrade request, binds the connection to a session, and pumps frames
//! between the socket and the reliable layer. Inbound processing is
//! serialized per connection: one request at a time enters the middleware
//! chain, while different sessions proceed in parallel.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::{ClientIdentity, HandshakeInspector, HANDSHAKE_REJECT_REASON};
use crate::middleware::Dispatcher;
use crate::protocol::Frame;
use crate::reliable::InboundCheck;
use crate::session::Session;
use crate::state::GatewayState;

/// Shared handles the transport needs per connection.
#[derive(Clone)]
pub struct TransportState {
    /// Gateway state.
    pub state: Arc<GatewayState>,
    /// Request dispatcher.
    pub dispatcher: Arc<Dispatcher>,
}

/// Builds the transport router with the `/ws` endpoint.
pub fn router(transport: TransportState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(transport)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(transport): State<TransportState>,
) -> Response {
    let inspector = HandshakeInspector::new(transport.state.config.auth.jwt_secret.clone());
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let identity = match inspector.extract(&query, &headers) {
        Ok(identity) if inspector.authorize(&identity) => identity,
        _ => {
            warn!("handshake rejected");
            return (StatusCode::UNAUTHORIZED, HANDSHAKE_REJECT_REASON).into_response();
        }
    };

    ws.max_message_size(transport.state.config.transport.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, identity, transport))
}

async fn handle_socket(socket: WebSocket, identity: ClientIdentity, transport: TransportState) {
    let state = transport.state;
    let dispatcher = transport.dispatcher;

    let (session, resumed) = state.sessions.bind(identity);
    state.metrics.record_connection();
    info!(session_id = %session.id(), resumed, "connection open");

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(state.config.transport.send_queue_size);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer: drains the outbound queue and keeps the peer pinged.
    let ping_interval = state.config.transport.ping_interval();
    let send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(bytes) => {
                        if ws_sender.send(Message::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Binding replays any unacked frames from before a reconnect.
    session.outbound().bind_sender(tx).await;

    let liveness = state.config.transport.liveness_timeout();
    loop {
        let message = match tokio::time::timeout(liveness, ws_receiver.next()).await {
            Err(_) => {
                warn!(session_id = %session.id(), "peer silent for two ping intervals");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                warn!(session_id = %session.id(), error = %e, "transport error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Binary(data) => {
                handle_frame(&state, &dispatcher, &session, &data).await;
            }
            Message::Text(_) => {
                warn!(session_id = %session.id(), "text frame ignored on binary protocol");
            }
            // Any traffic resets the liveness window above.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!(session_id = %session.id(), "close requested");
                break;
            }
        }
    }

    state.metrics.record_disconnection();
    state.sessions.disconnect(session.id());
    send_task.abort();
    info!(session_id = %session.id(), "connection closed");
}

/// Processes one inbound frame: acks feed the reliable layer, sequenced
/// frames run the dedup path, everything else dispatches directly.
async fn handle_frame(
    state: &Arc<GatewayState>,
    dispatcher: &Dispatcher,
    session: &Arc<Session>,
    data: &[u8],
) {
    let frame = match Frame::decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "undecodable frame");
            return;
        }
    };

    if frame.is_ack() {
        match frame.ack_seq() {
            Some(seq) => {
                session.outbound().ack(seq);
            }
            None => warn!(session_id = %session.id(), "ack frame without seq"),
        }
        return;
    }

    match frame.seq {
        Some(seq) => {
            match session.inbound().check(seq) {
                InboundCheck::Duplicate(cached) => {
                    debug!(session_id = %session.id(), seq, "duplicate inbound frame");
                    if let Some(bytes) = cached {
                        let _ = session.outbound().send_fire_and_forget(bytes).await;
                    }
                }
                InboundCheck::Fresh => {
                    let response = dispatcher.dispatch(session, frame).await;
                    let cached = match response {
                        Some(response) => match session.outbound().send_qos1(response).await {
                            Ok(bytes) => Some(bytes),
                            Err(e) => {
                                warn!(session_id = %session.id(), error = %e, "response encode failed");
                                None
                            }
                        },
                        // Silent drop: remember the seq, cache nothing.
                        None => None,
                    };
                    session
                        .inbound()
                        .record(seq, cached, state.idempotency.default_ttl());
                }
            }
        }
        None => {
            if let Some(response) = dispatcher.dispatch(session, frame).await {
                match response.encode() {
                    Ok(bytes) => {
                        let _ = session.outbound().send_fire_and_forget(bytes).await;
                    }
                    Err(e) => {
                        warn!(session_id = %session.id(), error = %e, "response encode failed");
                    }
                }
            }
        }
    }
}
