//! QoS-1 at-least-once delivery.
//!
//! This module provides the per-session reliable layer:
//! - [`ReliableQueue`] - outbound side: sequence assignment, an unacked
//!   buffer, linear-backoff retransmission, cumulative acks
//! - [`InboundLedger`] - inbound side: high-water deduplication with a
//!   bounded cache of prior responses
//!
//! Disconnect suspends retransmission without cancelling it; rebinding a
//! transport replays the unacked buffer in original order before any new
//! outbound traffic.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::config::ReliableConfig;
use crate::protocol::{Frame, ProtocolError};

/// Cap on cached inbound responses per session.
const RESPONSE_CACHE_CAP: usize = 128;

/// A frame awaiting acknowledgement.
#[derive(Debug, Clone)]
struct PendingFrame {
    seq: u64,
    bytes: Vec<u8>,
    /// Transmissions performed so far (1 after the initial send).
    attempts: u32,
    next_deadline: Instant,
}

#[derive(Debug, Default)]
struct OutboundState {
    next_seq: u64,
    pending: VecDeque<PendingFrame>,
    sender: Option<mpsc::Sender<Vec<u8>>>,
}

/// Outbound QoS-1 queue for one session.
#[derive(Debug)]
pub struct ReliableQueue {
    config: ReliableConfig,
    state: Mutex<OutboundState>,
    kick: Notify,
    closed: AtomicBool,
}

impl ReliableQueue {
    /// Creates an empty queue. Sequence numbers start at 1.
    #[must_use]
    pub fn new(config: ReliableConfig) -> Self {
        Self {
            config,
            state: Mutex::new(OutboundState {
                next_seq: 1,
                pending: VecDeque::new(),
                sender: None,
            }),
            kick: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Binds a transport sender, replaying every unacked frame in original
    /// order before any new outbound traffic.
    pub async fn bind_sender(&self, sender: mpsc::Sender<Vec<u8>>) {
        let replay: Vec<Vec<u8>> = {
            let mut state = self.state.lock();
            state.sender = Some(sender.clone());
            let now = Instant::now();
            for frame in &mut state.pending {
                frame.next_deadline = now + self.config.delay_for_attempt(frame.attempts);
            }
            state.pending.iter().map(|f| f.bytes.clone()).collect()
        };
        for bytes in replay {
            if sender.send(bytes).await.is_err() {
                break;
            }
        }
        self.kick.notify_one();
    }

    /// Unbinds the transport; retransmission suspends until rebind.
    pub fn unbind_sender(&self) {
        self.state.lock().sender = None;
        self.kick.notify_one();
    }

    /// Returns true if a transport is currently bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.state.lock().sender.is_some()
    }

    /// Sends a frame with at-least-once semantics.
    ///
    /// Assigns the next sequence number, buffers the encoded frame until it
    /// is acknowledged, and transmits immediately when a sender is bound.
    /// Returns the encoded bytes (used to answer duplicate requests with
    /// identical bytes).
    pub async fn send_qos1(&self, frame: Frame) -> Result<Vec<u8>, ProtocolError> {
        let (bytes, sender) = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            let encoded = frame.with_seq(seq).encode()?;
            state.pending.push_back(PendingFrame {
                seq,
                bytes: encoded.clone(),
                attempts: 1,
                next_deadline: Instant::now() + self.config.delay_for_attempt(1),
            });
            (encoded, state.sender.clone())
        };
        if let Some(sender) = sender {
            let _ = sender.send(bytes.clone()).await;
        }
        self.kick.notify_one();
        Ok(bytes)
    }

    /// Sends pre-encoded bytes without sequencing or retry.
    ///
    /// Returns false if no transport is bound or the send queue rejected
    /// the message; fire-and-forget traffic is best-effort by contract.
    pub async fn send_fire_and_forget(&self, bytes: Vec<u8>) -> bool {
        let sender = self.state.lock().sender.clone();
        match sender {
            Some(sender) => sender.send(bytes).await.is_ok(),
            None => false,
        }
    }

    /// Acknowledges sequence `seq` and, implicitly, every lower sequence.
    ///
    /// Returns how many pending frames were settled.
    pub fn ack(&self, seq: u64) -> usize {
        let mut state = self.state.lock();
        let before = state.pending.len();
        while state.pending.front().is_some_and(|f| f.seq <= seq) {
            state.pending.pop_front();
        }
        let settled = before - state.pending.len();
        if settled > 0 {
            debug!(seq, settled, "acked outbound frames");
            self.kick.notify_one();
        }
        settled
    }

    /// Number of frames awaiting acknowledgement.
    #[must_use]
    pub fn unacked_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Sequence numbers currently awaiting acknowledgement, in order.
    #[must_use]
    pub fn unacked_seqs(&self) -> Vec<u64> {
        self.state.lock().pending.iter().map(|f| f.seq).collect()
    }

    /// Marks the queue closed; the retry loop exits and buffered frames
    /// are discarded with the session.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.kick.notify_one();
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Earliest retransmission deadline, if retransmission is currently
    /// possible (frames pending and a transport bound).
    fn next_deadline(&self) -> Option<Instant> {
        let state = self.state.lock();
        if state.sender.is_none() {
            return None;
        }
        state.pending.iter().map(|f| f.next_deadline).min()
    }

    /// Retransmits every due frame, dropping frames whose retry budget is
    /// exhausted.
    async fn retransmit_due(&self) {
        let now = Instant::now();
        let budget = 1 + self.config.max_retry;
        let (due, sender) = {
            let mut state = self.state.lock();
            let Some(sender) = state.sender.clone() else {
                return;
            };
            let mut due = Vec::new();
            state.pending.retain_mut(|frame| {
                if frame.next_deadline > now {
                    return true;
                }
                if frame.attempts >= budget {
                    warn!(
                        seq = frame.seq,
                        attempts = frame.attempts,
                        "retry budget exhausted, dropping frame"
                    );
                    return false;
                }
                frame.attempts += 1;
                frame.next_deadline = now + self.config.delay_for_attempt(frame.attempts);
                due.push(frame.bytes.clone());
                true
            });
            (due, sender)
        };
        for bytes in due {
            if sender.send(bytes).await.is_err() {
                break;
            }
        }
    }
}

/// Drives retransmission for one session's queue until it is closed.
pub async fn run_retry_loop(queue: Arc<ReliableQueue>) {
    loop {
        if queue.is_closed() {
            return;
        }
        match queue.next_deadline() {
            Some(deadline) => {
                tokio::select! {
                    () = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        queue.retransmit_due().await;
                    }
                    () = queue.kick.notified() => {}
                }
            }
            None => queue.kick.notified().await,
        }
    }
}

/// Result of checking an inbound sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCheck {
    /// Not seen before; dispatch it.
    Fresh,
    /// Already processed; resend the cached response if one is held.
    Duplicate(Option<Vec<u8>>),
}

#[derive(Debug, Default)]
struct LedgerState {
    high_water: u64,
    responses: VecDeque<(u64, Vec<u8>, Instant)>,
}

/// Inbound deduplication ledger for one session.
///
/// `high_water` is the monotonically non-decreasing sequence of processed
/// inbound frames; anything at or below it is a duplicate and must not
/// re-enter the middleware chain.
#[derive(Debug, Default)]
pub struct InboundLedger {
    state: Mutex<LedgerState>,
}

impl InboundLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies an inbound sequence number.
    #[must_use]
    pub fn check(&self, seq: u64) -> InboundCheck {
        let mut state = self.state.lock();
        if seq > state.high_water {
            return InboundCheck::Fresh;
        }
        let now = Instant::now();
        state.responses.retain(|(_, _, expires)| *expires > now);
        let cached = state
            .responses
            .iter()
            .find(|(s, _, _)| *s == seq)
            .map(|(_, bytes, _)| bytes.clone());
        InboundCheck::Duplicate(cached)
    }

    /// Records a processed inbound frame, advancing the high-water mark and
    /// caching the response (when one was produced) for `ttl`.
    pub fn record(&self, seq: u64, response: Option<Vec<u8>>, ttl: Duration) {
        let mut state = self.state.lock();
        state.high_water = state.high_water.max(seq);
        if let Some(bytes) = response {
            state.responses.push_back((seq, bytes, Instant::now() + ttl));
            while state.responses.len() > RESPONSE_CACHE_CAP {
                state.responses.pop_front();
            }
        }
    }

    /// Current high-water mark.
    #[must_use]
    pub fn high_water(&self) -> u64 {
        self.state.lock().high_water
    }
}
