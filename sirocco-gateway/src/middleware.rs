//! Middleware chain and dispatcher.
//!
//! Every dispatched request passes, in order:
//! 1. Trace logging (method + session id, ingress timestamp for latency)
//! 2. Authentication gate - protected methods on unauthenticated sessions
//!    are silently dropped (no response frame; the client times out)
//! 3. Rate limiting - last-accepted-timestamp per `(session, method)`
//!
//! then the dispatcher routes by method. Unknown methods produce an
//! `UNKNOWN_METHOD` envelope; handler faults are caught here and surfaced
//! as `INTERNAL_ERROR`.

use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use sirocco_core::error::ErrorCode;

use crate::alerts;
use crate::config::RateLimitConfig;
use crate::error::HandlerResult;
use crate::protocol::Frame;
use crate::session::{Session, SessionId};
use crate::state::GatewayState;

/// Methods reachable without authentication.
const OPEN_METHODS: [&str; 2] = ["hello", "logout"];

/// Returns true if the method requires `authenticated == "true"`.
#[must_use]
pub fn is_protected(method: &str) -> bool {
    !OPEN_METHODS.contains(&method)
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCheck {
    /// Request may proceed.
    Allowed,
    /// Request rejected; retry no earlier than this.
    Limited {
        /// Remaining wait.
        retry_after: Duration,
    },
}

/// Last-accepted-timestamp rate limiter keyed by `(session, method)`.
///
/// Only methods with a configured policy are limited; the timestamp is
/// updated only when a request is accepted, so rejected attempts do not
/// extend the window.
#[derive(Debug)]
pub struct RateLimiter {
    policies: HashMap<&'static str, Duration>,
    last_accepted: DashMap<(SessionId, &'static str), Instant>,
}

impl RateLimiter {
    /// Builds the limiter from configuration.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        let mut policies = HashMap::new();
        policies.insert("orders.place", config.orders_place_interval());
        Self {
            policies,
            last_accepted: DashMap::new(),
        }
    }

    /// Checks the method against its policy, recording the acceptance.
    pub fn check_and_update(&self, session_id: SessionId, method: &str) -> RateCheck {
        let Some((&method_key, &min_interval)) = self.policies.get_key_value(method) else {
            return RateCheck::Allowed;
        };

        let key = (session_id, method_key);
        let now = Instant::now();
        if let Some(last) = self.last_accepted.get(&key) {
            let elapsed = now.duration_since(*last);
            if elapsed < min_interval {
                return RateCheck::Limited {
                    retry_after: min_interval - elapsed,
                };
            }
        }
        self.last_accepted.insert(key, now);
        RateCheck::Allowed
    }

    /// Drops stale entries (sessions gone or windows long elapsed).
    pub fn sweep(&self) {
        let horizon = self
            .policies
            .values()
            .max()
            .copied()
            .unwrap_or(Duration::from_secs(1))
            * 2;
        let now = Instant::now();
        self.last_accepted
            .retain(|_, last| now.duration_since(*last) < horizon);
    }
}

/// Boxed handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered method handler.
pub type HandlerFn =
    Arc<dyn Fn(Arc<GatewayState>, Arc<Session>, Value) -> HandlerFuture + Send + Sync>;

/// Method-routed dispatcher with the middleware chain in front.
pub struct Dispatcher {
    state: Arc<GatewayState>,
    handlers: HashMap<&'static str, HandlerFn>,
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers registered.
    #[must_use]
    pub fn new(state: Arc<GatewayState>) -> Self {
        Self {
            state,
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for a method.
    pub fn register<F>(&mut self, method: &'static str, handler: F)
    where
        F: Fn(Arc<GatewayState>, Arc<Session>, Value) -> HandlerFuture + Send + Sync + 'static,
    {
        self.handlers.insert(method, Arc::new(handler));
    }

    /// Registered method names.
    #[must_use]
    pub fn methods(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    /// Shared state handle.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Runs one request through the chain and its handler.
    ///
    /// Returns `None` only for the silent-drop path (protected method on
    /// an unauthenticated session).
    pub async fn dispatch(&self, session: &Arc<Session>, frame: Frame) -> Option<Frame> {
        let method = frame.method;
        let session_id = session.id();
        let started = Instant::now();

        info!(%session_id, method = %method, "request received");

        if is_protected(&method) && !session.is_authenticated() {
            warn!(%session_id, method = %method, "unauthenticated request dropped");
            return None;
        }

        if let RateCheck::Limited { retry_after } = self
            .state
            .rate_limiter
            .check_and_update(session_id, &method)
        {
            debug!(%session_id, method = %method, ?retry_after, "rate limited");
            return Some(Frame::error(
                method,
                ErrorCode::RateLimitExceeded,
                "Too many requests",
            ));
        }

        let Some(handler) = self.handlers.get(method.as_str()) else {
            return Some(Frame::error(
                method.clone(),
                ErrorCode::UnknownMethod,
                format!("no such method: {method}"),
            ));
        };

        let outcome = AssertUnwindSafe(handler(self.state.clone(), session.clone(), frame.body))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(body)) => Frame::new(method, body),
            Ok(Err(err)) => {
                if err.code() == ErrorCode::InternalError {
                    self.state.metrics.record_error();
                    alerts::check_and_broadcast(&self.state).await;
                }
                warn!(%session_id, method = %method, error = %err, "request failed");
                Frame::error(method, err.code(), err.to_string())
            }
            Err(_) => {
                self.state.metrics.record_error();
                alerts::check_and_broadcast(&self.state).await;
                Frame::error(method, ErrorCode::InternalError, "handler panicked")
            }
        };

        self.state.metrics.record_latency(started.elapsed());
        Some(response)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.methods().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClientIdentity, SessionToken};
    use serde_json::json;

    fn state() -> Arc<GatewayState> {
        Arc::new(GatewayState::for_tests())
    }

    fn bind_session(state: &Arc<GatewayState>) -> Arc<Session> {
        let (session, _) = state.sessions.bind(ClientIdentity {
            client_id: "c1".to_string(),
            device_id: 1,
            session_token: SessionToken([7; 16]),
        });
        session
    }

    fn echo_dispatcher(state: Arc<GatewayState>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(state);
        dispatcher.register("echo", |_, _, body| Box::pin(async move { Ok(body) }));
        dispatcher
    }

    #[test]
    fn test_protected_set() {
        assert!(!is_protected("hello"));
        assert!(!is_protected("logout"));
        assert!(is_protected("orders.place"));
        assert!(is_protected("metrics.get"));
    }

    #[test]
    fn test_rate_limiter_spacing() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        let id = SessionId::generate();

        assert_eq!(limiter.check_and_update(id, "orders.place"), RateCheck::Allowed);
        assert!(matches!(
            limiter.check_and_update(id, "orders.place"),
            RateCheck::Limited { .. }
        ));
    }

    #[test]
    fn test_rate_limiter_per_session() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        let a = SessionId::generate();
        let b = SessionId::generate();

        assert_eq!(limiter.check_and_update(a, "orders.place"), RateCheck::Allowed);
        assert_eq!(limiter.check_and_update(b, "orders.place"), RateCheck::Allowed);
    }

    #[test]
    fn test_rate_limiter_ignores_unpoliced_methods() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());
        let id = SessionId::generate();
        for _ in 0..10 {
            assert_eq!(limiter.check_and_update(id, "metrics.get"), RateCheck::Allowed);
        }
    }

    #[tokio::test]
    async fn test_silent_drop_for_unauthenticated() {
        let state = state();
        let session = bind_session(&state);
        let dispatcher = echo_dispatcher(state);

        let response = dispatcher
            .dispatch(&session, Frame::new("echo", json!({"x": 1})))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_envelope() {
        let state = state();
        let session = bind_session(&state);
        session.set_field("authenticated", "true", true);
        let dispatcher = echo_dispatcher(state);

        let response = dispatcher
            .dispatch(&session, Frame::new("nope", json!({})))
            .await
            .unwrap();
        assert_eq!(response.body["error"]["code"], "UNKNOWN_METHOD");
    }

    #[tokio::test]
    async fn test_handler_runs_after_gate() {
        let state = state();
        let session = bind_session(&state);
        session.set_field("authenticated", "true", true);
        let dispatcher = echo_dispatcher(state);

        let response = dispatcher
            .dispatch(&session, Frame::new("echo", json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(response.body["x"], 1);
        assert_eq!(response.method, "echo");
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_internal_error() {
        let state = state();
        let session = bind_session(&state);
        session.set_field("authenticated", "true", true);

        let mut dispatcher = Dispatcher::new(state.clone());
        dispatcher.register("boom", |_, _, _| {
            Box::pin(async { panic!("kaboom") })
        });

        let response = dispatcher
            .dispatch(&session, Frame::new("boom", json!({})))
            .await
            .unwrap();
        assert_eq!(response.body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(state.metrics.errors(), 1);
    }

    #[tokio::test]
    async fn test_latency_recorded() {
        let state = state();
        let session = bind_session(&state);
        session.set_field("authenticated", "true", true);
        let dispatcher = echo_dispatcher(state.clone());

        dispatcher
            .dispatch(&session, Frame::new("echo", json!({})))
            .await;
        // A sample landed: the snapshot leaves the empty-window baseline.
        assert!(state.metrics.snapshot().latency_ms >= 0.0);
    }
}
