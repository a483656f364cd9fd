//! End-to-end request-pipeline scenarios, driven through the dispatcher
//! against the in-memory demo collaborators.

use serde_json::json;
use std::sync::Arc;

use sirocco_gateway::auth::{ClientIdentity, SessionToken};
use sirocco_gateway::handlers::build_dispatcher;
use sirocco_gateway::middleware::Dispatcher;
use sirocco_gateway::protocol::Frame;
use sirocco_gateway::rooms::market_room;
use sirocco_gateway::session::Session;
use sirocco_gateway::simulator::MarketSimulator;
use sirocco_gateway::{GatewayConfig, GatewayState};

struct Harness {
    state: Arc<GatewayState>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new() -> Self {
        let state = Arc::new(GatewayState::with_demo_collaborators(
            GatewayConfig::default(),
        ));
        let dispatcher = build_dispatcher(state.clone());
        Self { state, dispatcher }
    }

    fn connect(&self, token_seed: u8) -> Arc<Session> {
        let (session, _) = self.state.sessions.bind(ClientIdentity {
            client_id: "c1".to_string(),
            device_id: 1,
            session_token: SessionToken([token_seed; 16]),
        });
        session
    }

    async fn call(&self, session: &Arc<Session>, method: &str, body: serde_json::Value) -> Frame {
        self.dispatcher
            .dispatch(session, Frame::new(method, body))
            .await
            .expect("expected a response frame")
    }

    async fn hello(&self, session: &Arc<Session>) {
        let response = self
            .call(
                session,
                "hello",
                json!({"token": "trader-abc", "clientId": "c1", "deviceId": "1"}),
            )
            .await;
        assert_eq!(response.body["userId"], "trader-user-123");
    }
}

fn place_body(key: &str) -> serde_json::Value {
    json!({
        "idempotencyKey": key,
        "symbol": "BTC-USD",
        "side": "BUY",
        "type": "LIMIT",
        "qty": 1,
        "price": 50_000,
    })
}

#[tokio::test]
async fn hello_then_place_order() {
    let harness = Harness::new();
    let session = harness.connect(1);

    let hello = harness
        .call(
            &session,
            "hello",
            json!({"token": "trader-abc", "clientId": "c1", "deviceId": "1"}),
        )
        .await;

    assert_eq!(hello.body["userId"], "trader-user-123");
    assert_eq!(hello.body["roles"], json!(["trader", "viewer"]));
    assert_eq!(hello.body["token"].as_str().unwrap().len(), 32);
    assert!(session.is_authenticated());

    let placed = harness.call(&session, "orders.place", place_body("k1")).await;
    assert_eq!(placed.body["status"], "ACK");
    assert_eq!(placed.body["echoKey"], "k1");
    assert!(placed.body["orderId"].as_str().unwrap().starts_with("ORD_"));
}

#[tokio::test]
async fn replaying_idempotency_key_returns_same_order() {
    let harness = Harness::new();
    let session = harness.connect(2);
    harness.hello(&session).await;

    let first = harness.call(&session, "orders.place", place_body("k1")).await;

    // Wait out the rate-limit window, then replay the same key.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = harness.call(&session, "orders.place", place_body("k1")).await;

    assert_eq!(first.body["orderId"], second.body["orderId"]);
    assert_eq!(second.body["status"], "ACK");
    // No second order was logged or counted.
    assert_eq!(harness.state.metrics.orders_placed(), 1);
    assert_eq!(
        harness
            .state
            .order_log
            .latest_per_order(None, None, 100)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn second_place_within_window_is_rate_limited() {
    let harness = Harness::new();
    let session = harness.connect(3);
    harness.hello(&session).await;

    let first = harness.call(&session, "orders.place", place_body("k1")).await;
    assert_eq!(first.body["status"], "ACK");

    let second = harness.call(&session, "orders.place", place_body("k2")).await;
    assert_eq!(second.body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    // The limited request never reached risk validation or the cache.
    assert!(harness.state.idempotency.get("k2").is_none());
    assert_eq!(harness.state.metrics.orders_placed(), 1);
}

#[tokio::test]
async fn risk_rejection_is_cached_under_the_key() {
    let harness = Harness::new();
    let session = harness.connect(4);
    harness.hello(&session).await;

    let oversized = json!({
        "idempotencyKey": "k3",
        "symbol": "BTC-USD",
        "side": "BUY",
        "type": "LIMIT",
        "qty": 1_000_000_000i64,
        "price": 1_000_000_000i64,
    });

    let first = harness
        .call(&session, "orders.place", oversized.clone())
        .await;
    assert_eq!(first.body["status"], "REJECTED");
    assert!(first.body["reason"]
        .as_str()
        .unwrap()
        .contains("Order notional limit exceeded"));

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = harness.call(&session, "orders.place", oversized).await;
    assert_eq!(second.body["status"], "REJECTED");
    assert_eq!(first.body["orderId"], second.body["orderId"]);
    assert_eq!(first.body["reason"], second.body["reason"]);
}

#[tokio::test]
async fn market_subscribe_churn_swaps_rooms_and_tick_flow() {
    let harness = Harness::new();
    let session = harness.connect(5);
    harness.hello(&session).await;

    let first = harness
        .call(&session, "market.subscribe", json!({"symbols": ["BTC-USD"]}))
        .await;
    assert_eq!(first.body["rooms"], json!(["market:BTC-USD"]));

    let second = harness
        .call(&session, "market.subscribe", json!({"symbols": ["ETH-USD"]}))
        .await;
    assert_eq!(second.body["leftRooms"], json!(["market:BTC-USD"]));
    assert_eq!(second.body["rooms"], json!(["market:ETH-USD"]));

    // A tick produced after the swap reaches the session only for ETH-USD.
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    session.outbound().bind_sender(tx).await;
    MarketSimulator::new().tick_once(&harness.state).await;

    let mut seen = Vec::new();
    while let Ok(bytes) = rx.try_recv() {
        let frame = Frame::decode(&bytes).unwrap();
        if frame.method == "market.tick" {
            seen.push(frame.body["symbol"].as_str().unwrap().to_string());
        }
    }
    assert_eq!(seen, vec!["ETH-USD".to_string()]);
}

#[tokio::test]
async fn reconnect_within_ttl_resumes_session_and_redelivers() {
    let harness = Harness::new();
    let session = harness.connect(6);
    harness.hello(&session).await;
    harness
        .call(&session, "market.subscribe", json!({"symbols": ["BTC-USD"]}))
        .await;

    // Place an order while no transport is bound: the QoS-1 response
    // buffers in the unacked queue.
    let placed = harness.call(&session, "orders.place", place_body("k1")).await;
    let bytes = session.outbound().send_qos1(placed).await.unwrap();
    assert_eq!(session.outbound().unacked_len(), 1);

    // Drop the connection, then rebind with the same resume token.
    harness.state.sessions.disconnect(session.id());
    let (resumed, was_resumed) = harness.state.sessions.bind(session.identity());
    assert!(was_resumed);
    assert_eq!(resumed.id(), session.id());

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    resumed.outbound().bind_sender(tx).await;

    // The pre-drop response is re-emitted on the new connection.
    let replayed = rx.recv().await.unwrap();
    assert_eq!(replayed, bytes);
    let frame = Frame::decode(&replayed).unwrap();
    assert_eq!(frame.body["status"], "ACK");

    // Session state survived the reconnect.
    assert!(resumed.is_authenticated());
    assert_eq!(
        resumed.field_list("subscribedRooms").unwrap(),
        vec!["market:BTC-USD".to_string()]
    );
    assert!(harness
        .state
        .rooms
        .members(&market_room("BTC-USD"))
        .contains(&resumed.id()));
}

#[tokio::test]
async fn protected_method_without_auth_is_silently_dropped() {
    let harness = Harness::new();
    let session = harness.connect(7);

    let response = harness
        .dispatcher
        .dispatch(&session, Frame::new("orders.place", place_body("k1")))
        .await;

    assert!(response.is_none());
    assert_eq!(harness.state.metrics.orders_placed(), 0);
    assert!(harness.state.idempotency.is_empty());
}

#[tokio::test]
async fn broadcast_delivers_exactly_once_per_member() {
    let harness = Harness::new();

    let mut receivers = Vec::new();
    for seed in 10..13u8 {
        let session = harness.connect(seed);
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        session.outbound().bind_sender(tx).await;
        harness.state.rooms.join("market:BTC-USD", session.id());
        receivers.push(rx);
    }

    let bytes = Frame::new("market.tick", json!({"symbol": "BTC-USD"}))
        .encode()
        .unwrap();
    let delivered = harness
        .state
        .rooms
        .broadcast("market:BTC-USD", bytes, &harness.state.sessions)
        .await;
    assert_eq!(delivered, 3);

    for rx in &mut receivers {
        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err(), "member received more than once");
    }
}

#[tokio::test]
async fn registered_alert_rule_fires_and_broadcasts() {
    let harness = Harness::new();
    let session = harness.connect(20);
    harness.hello(&session).await;

    harness.call(&session, "alerts.subscribe", json!({})).await;
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    session.outbound().bind_sender(tx).await;

    harness
        .call(
            &session,
            "alerts.register",
            json!({"ruleId": "lat-floor", "metricKey": "latencyMs", "operator": ">=", "threshold": 0.0}),
        )
        .await;

    let listing = harness.call(&session, "alerts.list", json!({})).await;
    let events = listing.body["alertEvents"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["ruleId"], "lat-floor");

    // The firing rule was pushed into the alerts room.
    let pushed = Frame::decode(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(pushed.method, "alerts.push");
    assert!(pushed.body["alerts"]
        .as_object()
        .unwrap()
        .contains_key("custom_rule_lat-floor"));
}

#[tokio::test]
async fn disabled_rule_stops_firing() {
    let harness = Harness::new();
    let session = harness.connect(21);
    harness.hello(&session).await;

    harness
        .call(
            &session,
            "alerts.register",
            json!({"ruleId": "r1", "metricKey": "latencyMs", "operator": ">=", "threshold": 0.0}),
        )
        .await;
    harness
        .call(&session, "alerts.disable", json!({"ruleId": "r1"}))
        .await;

    let listing = harness.call(&session, "alerts.list", json!({})).await;
    assert!(listing.body["alertEvents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_method_gets_error_envelope() {
    let harness = Harness::new();
    let session = harness.connect(22);
    harness.hello(&session).await;

    let response = harness.call(&session, "orders.teleport", json!({})).await;
    assert_eq!(response.body["error"]["code"], "UNKNOWN_METHOD");
}

#[tokio::test]
async fn logout_then_protected_method_is_dropped() {
    let harness = Harness::new();
    let session = harness.connect(23);
    harness.hello(&session).await;
    harness.call(&session, "logout", json!({})).await;

    let response = harness
        .dispatcher
        .dispatch(&session, Frame::new("metrics.get", json!({})))
        .await;
    assert!(response.is_none());
}
