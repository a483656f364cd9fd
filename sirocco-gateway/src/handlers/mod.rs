//! Typed request handlers.
//!
//! Each handler decodes its inputs from the frame body, runs against the
//! shared [`GatewayState`](crate::state::GatewayState), and returns the
//! response body. Error conversion and latency accounting happen at the
//! dispatcher boundary.

pub mod alerts;
pub mod history;
pub mod market;
pub mod metrics;
pub mod orders;
pub mod session;

use std::sync::Arc;

use crate::middleware::Dispatcher;
use crate::state::GatewayState;

/// Builds a dispatcher with every gateway method registered.
#[must_use]
pub fn build_dispatcher(state: Arc<GatewayState>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(state);

    dispatcher.register("hello", |s, sess, b| Box::pin(session::hello(s, sess, b)));
    dispatcher.register("logout", |s, sess, b| Box::pin(session::logout(s, sess, b)));

    dispatcher.register("orders.place", |s, sess, b| {
        Box::pin(orders::place(s, sess, b))
    });
    dispatcher.register("orders.cancel", |s, sess, b| {
        Box::pin(orders::cancel(s, sess, b))
    });
    dispatcher.register("orders.status", |s, sess, b| {
        Box::pin(orders::status(s, sess, b))
    });
    dispatcher.register("orders.history", |s, sess, b| {
        Box::pin(orders::history(s, sess, b))
    });

    dispatcher.register("market.subscribe", |s, sess, b| {
        Box::pin(market::subscribe(s, sess, b))
    });
    dispatcher.register("market.unsubscribe", |s, sess, b| {
        Box::pin(market::unsubscribe(s, sess, b))
    });
    dispatcher.register("market.list", |s, sess, b| {
        Box::pin(market::list(s, sess, b))
    });

    dispatcher.register("history.query", |s, sess, b| {
        Box::pin(history::query(s, sess, b))
    });
    dispatcher.register("history.latest", |s, sess, b| {
        Box::pin(history::latest(s, sess, b))
    });

    dispatcher.register("metrics.get", |s, sess, b| {
        Box::pin(metrics::get(s, sess, b))
    });

    dispatcher.register("alerts.subscribe", |s, sess, b| {
        Box::pin(alerts::subscribe(s, sess, b))
    });
    dispatcher.register("alerts.list", |s, sess, b| {
        Box::pin(alerts::list(s, sess, b))
    });
    dispatcher.register("alerts.register", |s, sess, b| {
        Box::pin(alerts::register(s, sess, b))
    });
    dispatcher.register("alerts.disable", |s, sess, b| {
        Box::pin(alerts::disable(s, sess, b))
    });

    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_methods_registered() {
        let dispatcher = build_dispatcher(Arc::new(GatewayState::for_tests()));
        let methods = dispatcher.methods();
        for expected in [
            "hello",
            "logout",
            "orders.place",
            "orders.cancel",
            "orders.status",
            "orders.history",
            "market.subscribe",
            "market.unsubscribe",
            "market.list",
            "history.query",
            "history.latest",
            "metrics.get",
            "alerts.subscribe",
            "alerts.list",
            "alerts.register",
            "alerts.disable",
        ] {
            assert!(methods.contains(&expected), "missing handler: {expected}");
        }
        assert_eq!(methods.len(), 16);
    }
}
