//! Gateway server lifecycle.
//!
//! Explicit construction (collaborators injected, no singletons), an
//! axum-served transport with graceful shutdown, and the periodic tasks:
//! market simulator, session sweep, idempotency sweep.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::collab::{HistoryRepository, OrderLog, RiskValidator};
use crate::config::GatewayConfig;
use crate::handlers;
use crate::middleware::Dispatcher;
use crate::shutdown::ShutdownController;
use crate::simulator::MarketSimulator;
use crate::state::GatewayState;
use crate::transport::{self, TransportState};

/// Server start/run failure.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen socket could not be bound.
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    /// The transport loop failed.
    #[error("serve failed: {0}")]
    Serve(std::io::Error),
}

/// The gateway server.
pub struct GatewayServer {
    state: Arc<GatewayState>,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownController,
}

impl GatewayServer {
    /// Constructs a server from configuration and collaborator handles.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        history: Option<Arc<dyn HistoryRepository>>,
        order_log: Arc<dyn OrderLog>,
        risk: Arc<dyn RiskValidator>,
    ) -> Self {
        let state = Arc::new(GatewayState::new(config, history, order_log, risk));
        let dispatcher = Arc::new(handlers::build_dispatcher(state.clone()));
        Self {
            state,
            dispatcher,
            shutdown: ShutdownController::new(),
        }
    }

    /// Constructs a server wired with the in-memory demo collaborators.
    #[must_use]
    pub fn with_demo_collaborators(config: GatewayConfig) -> Self {
        let state = Arc::new(GatewayState::with_demo_collaborators(config));
        let dispatcher = Arc::new(handlers::build_dispatcher(state.clone()));
        Self {
            state,
            dispatcher,
            shutdown: ShutdownController::new(),
        }
    }

    /// Shared state handle.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// The shutdown controller driving this server.
    #[must_use]
    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// Binds the listener and serves until shutdown.
    ///
    /// On return the rooms are drained and every session queue closed; no
    /// state is persisted.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.state.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(ServerError::Bind)?;
        info!(%addr, "gateway listening");

        self.spawn_periodic_tasks();

        let router = transport::router(TransportState {
            state: self.state.clone(),
            dispatcher: self.dispatcher.clone(),
        });
        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(ServerError::Serve)?;

        self.state.rooms.drain();
        self.state.sessions.close_all();
        info!("gateway stopped");
        Ok(())
    }

    fn spawn_periodic_tasks(&self) {
        if self.state.config.simulator.enabled {
            tokio::spawn(
                Arc::new(MarketSimulator::new()).run(self.state.clone(), self.shutdown.clone()),
            );
        }
        tokio::spawn(session_sweep_loop(
            self.state.clone(),
            self.shutdown.clone(),
        ));
        tokio::spawn(idempotency_sweep_loop(
            self.state.clone(),
            self.shutdown.clone(),
        ));
    }
}

/// Destroys TTL-expired sessions and prunes rate-limit slots.
async fn session_sweep_loop(state: Arc<GatewayState>, shutdown: ShutdownController) {
    let mut interval = tokio::time::interval(state.config.session.sweep_interval());
    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let destroyed = state.sessions.sweep_expired(&state.rooms);
                if destroyed > 0 {
                    debug!(destroyed, "session sweep");
                }
                state.rate_limiter.sweep();
            }
            _ = stop.recv() => break,
        }
    }
}

/// Eagerly expires idempotency entries.
async fn idempotency_sweep_loop(state: Arc<GatewayState>, shutdown: ShutdownController) {
    let mut interval = tokio::time::interval(state.config.idempotency.sweep_interval());
    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.idempotency.sweep();
            }
            _ = stop.recv() => break,
        }
    }
}
