//! Session registry.
//!
//! A session is the server-side identity of one client, surviving
//! transport reconnects within a TTL. It owns:
//! - a typed key/value field bag
//! - the QoS-1 outbound queue and inbound dedup ledger
//! - the resume token binding
//!
//! Sessions are created on first successful handshake and destroyed once
//! no transport is bound and the TTL has elapsed.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::auth::ClientIdentity;
use crate::config::{ReliableConfig, SessionConfig};
use crate::error::GatewayError;
use crate::reliable::{self, InboundLedger, ReliableQueue};
use crate::rooms::RoomRegistry;

/// Unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Generates a new unique session ID.
    #[must_use]
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the inner value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// A tagged session field value.
///
/// The bag is only interpreted by its known callers; each entry carries
/// its kind so no generic deserializer is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// UTF-8 string.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// List of strings.
    List(Vec<String>),
}

impl FieldValue {
    /// Returns the string form, if this is a string field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer form, if this is an integer field.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the list form, if this is a list field.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

#[derive(Debug, Clone)]
struct FieldEntry {
    value: FieldValue,
    /// Entries not marked persistent are cleared when the transport
    /// unbinds; persistent entries survive resume within the TTL.
    persist: bool,
}

/// One client session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    identity: Mutex<ClientIdentity>,
    created_at: i64,
    fields: RwLock<HashMap<String, FieldEntry>>,
    expires_at: Mutex<Option<Instant>>,
    outbound: Arc<ReliableQueue>,
    inbound: InboundLedger,
    destroyed: AtomicBool,
}

impl Session {
    fn new(identity: ClientIdentity, reliable: ReliableConfig) -> Self {
        Self {
            id: SessionId::generate(),
            identity: Mutex::new(identity),
            created_at: chrono::Utc::now().timestamp_millis(),
            fields: RwLock::new(HashMap::new()),
            expires_at: Mutex::new(None),
            outbound: Arc::new(ReliableQueue::new(reliable)),
            inbound: InboundLedger::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns a copy of the bound identity.
    #[must_use]
    pub fn identity(&self) -> ClientIdentity {
        self.identity.lock().clone()
    }

    /// Creation time, unix milliseconds.
    #[must_use]
    pub const fn created_at(&self) -> i64 {
        self.created_at
    }

    /// The QoS-1 outbound queue.
    #[must_use]
    pub fn outbound(&self) -> &Arc<ReliableQueue> {
        &self.outbound
    }

    /// The inbound dedup ledger.
    #[must_use]
    pub fn inbound(&self) -> &InboundLedger {
        &self.inbound
    }

    /// Sets a field, overwriting any previous value.
    pub fn set_field(&self, key: impl Into<String>, value: impl Into<FieldValue>, persist: bool) {
        self.fields.write().insert(
            key.into(),
            FieldEntry {
                value: value.into(),
                persist,
            },
        );
    }

    /// Returns a field value.
    #[must_use]
    pub fn get_field(&self, key: &str) -> Option<FieldValue> {
        self.fields.read().get(key).map(|e| e.value.clone())
    }

    /// Returns a string field.
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<String> {
        self.get_field(key).and_then(|v| match v {
            FieldValue::Str(s) => Some(s),
            _ => None,
        })
    }

    /// Returns a list field.
    #[must_use]
    pub fn field_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_field(key).and_then(|v| match v {
            FieldValue::List(items) => Some(items),
            _ => None,
        })
    }

    /// Removes a field.
    pub fn remove_field(&self, key: &str) {
        self.fields.write().remove(key);
    }

    /// Returns true if the session field `authenticated` equals `"true"`.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.field_str("authenticated").as_deref() == Some("true")
    }

    /// Returns true if a transport is currently bound.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.outbound.is_bound()
    }

    fn clear_transient_fields(&self) {
        self.fields.write().retain(|_, entry| entry.persist);
    }

    fn start_ttl(&self, ttl: std::time::Duration) {
        *self.expires_at.lock() = Some(Instant::now() + ttl);
    }

    fn cancel_ttl(&self) {
        *self.expires_at.lock() = None;
    }

    fn is_expired(&self, now: Instant) -> bool {
        !self.is_connected() && self.expires_at.lock().is_some_and(|at| now > at)
    }
}

/// Registry of all live sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    session_config: SessionConfig,
    reliable_config: ReliableConfig,
    sessions: DashMap<SessionId, Arc<Session>>,
    by_token: DashMap<[u8; 16], SessionId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(session_config: SessionConfig, reliable_config: ReliableConfig) -> Self {
        Self {
            session_config,
            reliable_config,
            sessions: DashMap::new(),
            by_token: DashMap::new(),
        }
    }

    /// Binds an identity to a session.
    ///
    /// If the presented resume token names a live or TTL-live session, that
    /// session is rebound (fields, unacked outbound, inbound high-water,
    /// and room memberships retained). Otherwise a fresh session is
    /// allocated and its retry task spawned.
    ///
    /// Returns the session and whether it was resumed.
    pub fn bind(&self, identity: ClientIdentity) -> (Arc<Session>, bool) {
        let token = identity.session_token.0;
        if let Some(existing) = self.by_token.get(&token).map(|e| *e.value()) {
            if let Some(session) = self.sessions.get(&existing).map(|e| e.clone()) {
                session.cancel_ttl();
                *session.identity.lock() = identity;
                info!(session_id = %session.id(), "session resumed");
                return (session, true);
            }
        }

        let session = Arc::new(Session::new(identity, self.reliable_config.clone()));
        self.sessions.insert(session.id(), session.clone());
        self.by_token.insert(token, session.id());
        tokio::spawn(reliable::run_retry_loop(session.outbound().clone()));
        info!(session_id = %session.id(), "session created");
        (session, false)
    }

    /// Looks up a session by id.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|e| e.clone())
    }

    /// Reads a field through the registry.
    pub fn get_field(&self, id: SessionId, key: &str) -> Result<Option<FieldValue>, GatewayError> {
        self.get(id)
            .map(|s| s.get_field(key))
            .ok_or(GatewayError::UnknownSession(id))
    }

    /// Writes a field through the registry.
    pub fn set_field(
        &self,
        id: SessionId,
        key: &str,
        value: impl Into<FieldValue>,
        persist: bool,
    ) -> Result<(), GatewayError> {
        let session = self.get(id).ok_or(GatewayError::UnknownSession(id))?;
        session.set_field(key, value, persist);
        Ok(())
    }

    /// Unbinds the transport and starts the TTL countdown.
    pub fn disconnect(&self, id: SessionId) {
        if let Some(session) = self.get(id) {
            session.outbound().unbind_sender();
            session.clear_transient_fields();
            session.start_ttl(self.session_config.ttl());
            debug!(session_id = %session.id(), "session disconnected, TTL started");
        }
    }

    /// Destroys sessions whose TTL elapsed without a rebind.
    ///
    /// Returns how many sessions were destroyed.
    pub fn sweep_expired(&self, rooms: &RoomRegistry) -> usize {
        let now = Instant::now();
        let expired: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.value().clone())
            .collect();

        for session in &expired {
            session.destroyed.store(true, Ordering::SeqCst);
            session.outbound().close();
            rooms.leave_all(session.id());
            self.by_token.remove(&session.identity().session_token.0);
            self.sessions.remove(&session.id());
            info!(session_id = %session.id(), "session expired");
        }
        expired.len()
    }

    /// Number of live sessions (connected or within TTL).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions with a bound transport.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_connected())
            .count()
    }

    /// Closes every session's queue (used during shutdown).
    pub fn close_all(&self) {
        for entry in &self.sessions {
            entry.value().outbound().close();
        }
    }
}
