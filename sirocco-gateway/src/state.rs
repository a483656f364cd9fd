//! Shared gateway state.

use std::sync::Arc;

use crate::alerts::AlertEngine;
use crate::auth::TokenVerifier;
use crate::collab::{
    HistoryRepository, MemoryHistoryRepository, MemoryOrderLog, NotionalRiskValidator, OrderLog,
    RiskValidator,
};
use crate::config::GatewayConfig;
use crate::idempotency::IdempotencyCache;
use crate::metrics::MetricsRegistry;
use crate::middleware::RateLimiter;
use crate::rooms::RoomRegistry;
use crate::session::SessionRegistry;
use crate::simulator;

use sirocco_core::Symbol;

/// Everything the handlers and periodic tasks share.
///
/// Collaborators are capability handles injected at construction; each
/// internal registry carries its own lock and no lock is held across a
/// collaborator call.
pub struct GatewayState {
    /// Gateway configuration.
    pub config: GatewayConfig,
    /// Session registry.
    pub sessions: SessionRegistry,
    /// Room registry.
    pub rooms: RoomRegistry,
    /// Idempotency cache.
    pub idempotency: IdempotencyCache,
    /// Process-wide metrics.
    pub metrics: MetricsRegistry,
    /// Alert rule store and evaluator.
    pub alerts: AlertEngine,
    /// Demo token verifier.
    pub verifier: TokenVerifier,
    /// Per-session method rate limiter.
    pub rate_limiter: RateLimiter,
    /// History repository; absent means `SERVICE_UNAVAILABLE`.
    pub history: Option<Arc<dyn HistoryRepository>>,
    /// Order-log sink.
    pub order_log: Arc<dyn OrderLog>,
    /// Risk validator.
    pub risk: Arc<dyn RiskValidator>,
}

impl GatewayState {
    /// Assembles the state from configuration and collaborator handles.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        history: Option<Arc<dyn HistoryRepository>>,
        order_log: Arc<dyn OrderLog>,
        risk: Arc<dyn RiskValidator>,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(config.session.clone(), config.reliable.clone()),
            rooms: RoomRegistry::new(),
            idempotency: IdempotencyCache::new(config.idempotency.clone()),
            metrics: MetricsRegistry::new(),
            alerts: AlertEngine::new(),
            verifier: TokenVerifier,
            rate_limiter: RateLimiter::new(&config.rate_limit),
            history,
            order_log,
            risk,
            config,
        }
    }

    /// State wired with the in-memory demo collaborators.
    #[must_use]
    pub fn with_demo_collaborators(config: GatewayConfig) -> Self {
        let history = MemoryHistoryRepository::new(
            simulator::SYMBOLS
                .iter()
                .map(|spec| (Symbol::new(spec.code), spec.base_price))
                .collect(),
        );
        Self::new(
            config,
            Some(Arc::new(history)),
            Arc::new(MemoryOrderLog::new()),
            Arc::new(NotionalRiskValidator::default()),
        )
    }

    /// Default-configured state for tests.
    #[cfg(test)]
    #[must_use]
    pub fn for_tests() -> Self {
        Self::with_demo_collaborators(GatewayConfig::default())
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("rooms", &self.rooms.len())
            .finish_non_exhaustive()
    }
}
