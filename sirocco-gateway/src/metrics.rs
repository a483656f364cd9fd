//! Process-wide metrics.
//!
//! Atomic counters for orders, errors, and connections, plus a bounded
//! window of recent request latencies. [`MetricsRegistry::snapshot`]
//! derives throughput, error rate, and a latency estimate; the snapshot
//! is what alert rules evaluate against.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use sirocco_core::MetricsSnapshot;

/// Number of latency samples retained.
const LATENCY_WINDOW: usize = 256;

/// Latency reported before any sample exists, in milliseconds.
const BASELINE_LATENCY_MS: f64 = 0.5;

/// Process-wide counters with derived metrics.
#[derive(Debug)]
pub struct MetricsRegistry {
    start: Instant,
    orders_placed: AtomicU64,
    orders_cancelled: AtomicU64,
    errors: AtomicU64,
    connections: AtomicU64,
    latencies: Mutex<VecDeque<f64>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Creates a registry with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            orders_placed: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
        }
    }

    /// Records a placed order.
    pub fn record_order_placed(&self) {
        self.orders_placed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cancelled order.
    pub fn record_order_cancelled(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a handler error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a new transport connection.
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a transport disconnection.
    pub fn record_disconnection(&self) {
        // Saturating: a miscounted disconnect must not wrap the gauge.
        let _ = self
            .connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Records one request latency sample.
    pub fn record_latency(&self, elapsed: Duration) {
        let mut window = self.latencies.lock();
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    /// Total orders placed.
    #[must_use]
    pub fn orders_placed(&self) -> u64 {
        self.orders_placed.load(Ordering::Relaxed)
    }

    /// Total orders cancelled.
    #[must_use]
    pub fn orders_cancelled(&self) -> u64 {
        self.orders_cancelled.load(Ordering::Relaxed)
    }

    /// Total handler errors.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Currently connected transports.
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Uptime since construction.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    /// Derives a point-in-time snapshot from the counters.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let placed = self.orders_placed() as f64;
        let cancelled = self.orders_cancelled() as f64;
        let errors = self.errors() as f64;

        let uptime_secs = self.uptime().as_secs_f64();
        let throughput = if uptime_secs > 0.0 {
            placed / uptime_secs
        } else {
            0.0
        };

        let operations = placed + cancelled;
        let error_rate = if operations > 0.0 {
            errors / operations
        } else {
            0.0
        };

        let latency_ms = {
            let window = self.latencies.lock();
            if window.is_empty() {
                BASELINE_LATENCY_MS
            } else {
                window.iter().sum::<f64>() / window.len() as f64
            }
        };

        MetricsSnapshot {
            ts: chrono::Utc::now().timestamp_millis(),
            latency_ms,
            throughput,
            error_rate,
            conn_count: self.connections().min(u64::from(u32::MAX)) as u32,
        }
    }
}
