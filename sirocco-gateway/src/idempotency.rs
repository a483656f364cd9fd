//! Idempotency cache.
//!
//! Time-bounded mapping from a client-supplied key to the prior
//! [`OrderResult`], with at-most-one concurrent producer per key: the
//! first producer publishes an in-flight placeholder, and later requests
//! for the same key wait for its result (or take the key over after a
//! deadline).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

use sirocco_core::OrderResult;

use crate::config::IdempotencyConfig;

#[derive(Debug, Clone)]
enum Entry {
    /// A producer is executing the handler for this key.
    InFlight(Arc<Notify>),
    /// A completed result, replayable until expiry.
    Ready {
        result: OrderResult,
        expires_at: Instant,
    },
}

type Shared = Arc<Mutex<HashMap<String, Entry>>>;

/// Outcome of [`IdempotencyCache::begin`].
#[derive(Debug)]
pub enum Begin {
    /// This caller owns the key; it must complete (or drop) the slot.
    Owner(ProducerSlot),
    /// A prior producer's result, returned verbatim.
    Hit(OrderResult),
}

/// Exclusive production right for one key.
///
/// Dropping the slot without completing it removes the placeholder and
/// wakes any waiters, so a failed producer never wedges the key.
#[derive(Debug)]
pub struct ProducerSlot {
    entries: Shared,
    key: String,
    notify: Arc<Notify>,
    completed: bool,
}

impl ProducerSlot {
    /// Publishes the result under the key and wakes all waiters.
    pub fn complete(mut self, result: OrderResult, ttl: Duration) {
        self.entries.lock().insert(
            self.key.clone(),
            Entry::Ready {
                result,
                expires_at: Instant::now() + ttl,
            },
        );
        self.completed = true;
        self.notify.notify_waiters();
    }
}

impl Drop for ProducerSlot {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!(key = %self.key, "producer abandoned idempotency slot");
        {
            let mut entries = self.entries.lock();
            // Only evict our own placeholder; a successor may already
            // have claimed the key after a wait-deadline takeover.
            let ours = matches!(
                entries.get(&self.key),
                Some(Entry::InFlight(current)) if Arc::ptr_eq(current, &self.notify)
            );
            if ours {
                entries.remove(&self.key);
            }
        }
        self.notify.notify_waiters();
    }
}

/// Time-bounded idempotency cache.
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    entries: Shared,
    config: IdempotencyConfig,
}

impl IdempotencyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Default entry TTL.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.config.ttl()
    }

    /// Claims the key or returns the prior result.
    ///
    /// If another producer holds the key in flight, this waits for its
    /// result up to the configured deadline, then takes the key over.
    pub async fn begin(&self, key: &str) -> Begin {
        let deadline = Instant::now() + self.config.in_flight_wait();
        loop {
            enum Found {
                Free,
                Hit(OrderResult),
                InFlight(Arc<Notify>),
            }

            let found = {
                let mut entries = self.entries.lock();
                let found = match entries.get(key) {
                    None => Found::Free,
                    Some(Entry::Ready { result, expires_at }) => {
                        if *expires_at > Instant::now() {
                            Found::Hit(result.clone())
                        } else {
                            Found::Free
                        }
                    }
                    Some(Entry::InFlight(notify)) => Found::InFlight(notify.clone()),
                };
                if matches!(found, Found::Free) {
                    let notify = Arc::new(Notify::new());
                    entries.insert(key.to_string(), Entry::InFlight(notify.clone()));
                    return Begin::Owner(ProducerSlot {
                        entries: self.entries.clone(),
                        key: key.to_string(),
                        notify,
                        completed: false,
                    });
                }
                found
            };

            match found {
                Found::Free => unreachable!("free keys are claimed under the lock"),
                Found::Hit(result) => return Begin::Hit(result),
                Found::InFlight(notify) => {
                    if Instant::now() >= deadline {
                        // The producer outlived the wait budget: evict its
                        // placeholder and claim the key on the next pass.
                        warn!(key, "in-flight idempotency wait deadline elapsed");
                        let mut entries = self.entries.lock();
                        let stale = matches!(
                            entries.get(key),
                            Some(Entry::InFlight(current)) if Arc::ptr_eq(current, &notify)
                        );
                        if stale {
                            entries.remove(key);
                        }
                        continue;
                    }
                    // Re-check periodically: completion may land between the
                    // map read above and this wait registering.
                    let _ =
                        tokio::time::timeout(Duration::from_millis(250), notify.notified()).await;
                }
            }
        }
    }

    /// Returns the cached result if present and not expired.
    ///
    /// Expired entries are removed lazily here.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<OrderResult> {
        let mut entries = self.entries.lock();
        let (hit, expired) = match entries.get(key) {
            Some(Entry::Ready { result, expires_at }) => {
                if *expires_at > Instant::now() {
                    (Some(result.clone()), false)
                } else {
                    (None, true)
                }
            }
            _ => (None, false),
        };
        if expired {
            entries.remove(key);
        }
        hit
    }

    /// Inserts or overwrites a result with the given TTL.
    pub fn put(&self, key: &str, result: OrderResult, ttl: Duration) {
        self.entries.lock().insert(
            key.to_string(),
            Entry::Ready {
                result,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Eagerly removes expired entries.
    ///
    /// Returns how many entries were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| match entry {
            Entry::InFlight(_) => true,
            Entry::Ready { expires_at, .. } => *expires_at > now,
        });
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "swept expired idempotency entries");
        }
        removed
    }

    /// Number of entries, including in-flight placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
