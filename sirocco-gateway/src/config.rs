//! Gateway configuration types.
//!
//! This module provides configuration for the gateway including:
//! - Server binding address and port
//! - Transport (ping, frame size, queue) settings
//! - Reliable-delivery (QoS-1) settings
//! - Session TTL and sweep intervals
//! - Rate limiting, idempotency, and simulator settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// QoS-1 delivery settings.
    #[serde(default)]
    pub reliable: ReliableConfig,

    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Per-session rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Idempotency cache settings.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    /// Market-data simulator settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth: AuthConfig::default(),
            transport: TransportConfig::default(),
            reliable: ReliableConfig::default(),
            session: SessionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            idempotency: IdempotencyConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Returns the socket bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret mixed into session-resume token derivation.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
        }
    }
}

/// Framed-transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Server ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Maximum inbound frame size in bytes; oversize frames are fatal.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Maximum queued outbound messages per connection.
    #[serde(default = "default_send_queue_size")]
    pub send_queue_size: usize,
}

impl TransportConfig {
    /// Returns the ping interval as a [`Duration`].
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Liveness deadline: a peer silent for two ping intervals is gone.
    #[must_use]
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs * 2)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            max_frame_bytes: default_max_frame_bytes(),
            send_queue_size: default_send_queue_size(),
        }
    }
}

/// QoS-1 retransmission configuration.
///
/// Backoff is linear: `delay(attempt) = min(base_retry * attempt,
/// max_backoff)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliableConfig {
    /// Initial retry delay in milliseconds.
    #[serde(default = "default_base_retry_ms")]
    pub base_retry_ms: u64,

    /// Cap on the retry delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Retry budget per frame; exhaustion drops the frame.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
}

impl ReliableConfig {
    /// Returns the linear-backoff delay for the given attempt (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ms = (self.base_retry_ms * u64::from(attempt.max(1))).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            base_retry_ms: default_base_retry_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retry: default_max_retry(),
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a disconnected session survives before destruction.
    #[serde(default = "default_session_ttl_ms")]
    pub ttl_ms: u64,

    /// Sweep cadence for expired sessions.
    #[serde(default = "default_session_sweep_ms")]
    pub sweep_interval_ms: u64,
}

impl SessionConfig {
    /// Returns the session TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Returns the sweep interval as a [`Duration`].
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_session_ttl_ms(),
            sweep_interval_ms: default_session_sweep_ms(),
        }
    }
}

/// Per-session, per-method rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum spacing between accepted `orders.place` requests.
    #[serde(default = "default_orders_place_interval_ms")]
    pub orders_place_interval_ms: u64,
}

impl RateLimitConfig {
    /// Returns the `orders.place` spacing as a [`Duration`].
    #[must_use]
    pub fn orders_place_interval(&self) -> Duration {
        Duration::from_millis(self.orders_place_interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            orders_place_interval_ms: default_orders_place_interval_ms(),
        }
    }
}

/// Idempotency cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Entry time-to-live in milliseconds.
    #[serde(default = "default_idempotency_ttl_ms")]
    pub ttl_ms: u64,

    /// Sweep cadence for expired entries.
    #[serde(default = "default_idempotency_sweep_ms")]
    pub sweep_interval_ms: u64,

    /// How long a concurrent producer waits on an in-flight key before
    /// taking it over.
    #[serde(default = "default_in_flight_wait_ms")]
    pub in_flight_wait_ms: u64,
}

impl IdempotencyConfig {
    /// Returns the entry TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Returns the sweep interval as a [`Duration`].
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Returns the in-flight wait deadline as a [`Duration`].
    #[must_use]
    pub fn in_flight_wait(&self) -> Duration {
        Duration::from_millis(self.in_flight_wait_ms)
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_idempotency_ttl_ms(),
            sweep_interval_ms: default_idempotency_sweep_ms(),
            in_flight_wait_ms: default_in_flight_wait_ms(),
        }
    }
}

/// Market-data simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Whether the simulator runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tick production interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl SimulatorConfig {
    /// Returns the tick interval as a [`Duration`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

// Default value functions

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_jwt_secret() -> String {
    // Loaded from the environment in production deployments.
    "change-me-in-production".to_string()
}

fn default_ping_interval() -> u64 {
    30
}

fn default_max_frame_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_send_queue_size() -> usize {
    256
}

fn default_base_retry_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_max_retry() -> u32 {
    5
}

fn default_session_ttl_ms() -> u64 {
    30_000
}

fn default_session_sweep_ms() -> u64 {
    5_000
}

fn default_orders_place_interval_ms() -> u64 {
    1_000
}

fn default_idempotency_ttl_ms() -> u64 {
    300_000
}

fn default_idempotency_sweep_ms() -> u64 {
    60_000
}

fn default_in_flight_wait_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    1_000
}
