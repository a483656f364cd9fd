//! Market-data simulator.
//!
//! A cooperative periodic task: every tick interval it draws a price
//! change per symbol from that symbol's volatility range and broadcasts
//! `{symbol, price, changePct, volume, seq, timestamp}` into the symbol's
//! market room. `seq` is process-wide and monotonic. Broadcasting is
//! fire-and-forget and never blocks request processing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::protocol::Frame;
use crate::rooms::market_room;
use crate::shutdown::ShutdownController;
use crate::state::GatewayState;

/// Method name of tick push frames.
pub const TICK_METHOD: &str = "market.tick";

/// Static description of one simulated instrument.
#[derive(Debug, Clone, Copy)]
pub struct SymbolSpec {
    /// Symbol code.
    pub code: &'static str,
    /// Price the random walk oscillates around.
    pub base_price: f64,
    /// Per-tick fractional volatility (0.002 = 0.2%).
    pub volatility: f64,
    /// Typical per-tick volume.
    pub base_volume: i64,
    /// Maximum volume deviation per tick.
    pub volume_swing: i64,
}

/// The simulated instrument universe.
pub const SYMBOLS: [SymbolSpec; 8] = [
    SymbolSpec {
        code: "ETH-USD",
        base_price: 2500.0,
        volatility: 0.003,
        base_volume: 30_000,
        volume_swing: 15_000,
    },
    SymbolSpec {
        code: "BTC-USD",
        base_price: 45_000.0,
        volatility: 0.002,
        base_volume: 50_000,
        volume_swing: 20_000,
    },
    SymbolSpec {
        code: "ADA-USD",
        base_price: 0.45,
        volatility: 0.004,
        base_volume: 10_000,
        volume_swing: 5_000,
    },
    SymbolSpec {
        code: "SOL-USD",
        base_price: 95.0,
        volatility: 0.004,
        base_volume: 10_000,
        volume_swing: 5_000,
    },
    SymbolSpec {
        code: "DOGE-USD",
        base_price: 0.08,
        volatility: 0.005,
        base_volume: 80_000,
        volume_swing: 30_000,
    },
    SymbolSpec {
        code: "AVAX-USD",
        base_price: 25.0,
        volatility: 0.004,
        base_volume: 15_000,
        volume_swing: 8_000,
    },
    SymbolSpec {
        code: "MATIC-USD",
        base_price: 0.75,
        volatility: 0.005,
        base_volume: 25_000,
        volume_swing: 12_000,
    },
    SymbolSpec {
        code: "LINK-USD",
        base_price: 12.5,
        volatility: 0.003,
        base_volume: 20_000,
        volume_swing: 10_000,
    },
];

/// Symbol codes of the simulated universe.
#[must_use]
pub fn available_symbols() -> Vec<&'static str> {
    SYMBOLS.iter().map(|s| s.code).collect()
}

/// Periodic tick producer.
#[derive(Debug, Default)]
pub struct MarketSimulator {
    seq: AtomicU64,
}

impl MarketSimulator {
    /// Creates a simulator with the sequence at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the tick loop until shutdown.
    pub async fn run(self: Arc<Self>, state: Arc<GatewayState>, shutdown: ShutdownController) {
        let mut interval = tokio::time::interval(state.config.simulator.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut stop = shutdown.subscribe();

        info!(
            symbols = SYMBOLS.len(),
            interval_ms = state.config.simulator.tick_interval_ms,
            "market simulator started"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick_once(&state).await,
                _ = stop.recv() => break,
            }
        }
        info!("market simulator stopped");
    }

    /// Produces and broadcasts one tick per symbol.
    pub async fn tick_once(&self, state: &GatewayState) {
        let mut rng = StdRng::from_entropy();
        let timestamp = chrono::Utc::now().timestamp_millis();

        for spec in &SYMBOLS {
            let change = rng.gen_range(-spec.volatility..=spec.volatility);
            let price = spec.base_price * (1.0 + change);
            let change_pct = change * 100.0;
            let volume = (spec.base_volume + rng.gen_range(-spec.volume_swing..=spec.volume_swing))
                .max(1_000);
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;

            let frame = Frame::new(
                TICK_METHOD,
                serde_json::json!({
                    "symbol": spec.code,
                    "price": price,
                    "changePct": change_pct,
                    "volume": volume,
                    "seq": seq,
                    "timestamp": timestamp,
                }),
            );
            let bytes = match frame.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(symbol = spec.code, error = %e, "tick encode failed");
                    continue;
                }
            };

            let room = market_room(spec.code);
            let delivered = state.rooms.broadcast(&room, bytes, &state.sessions).await;
            if delivered > 0 {
                debug!(symbol = spec.code, seq, delivered, "tick broadcast");
            }
        }
    }

    /// Current value of the process-wide tick sequence.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}
