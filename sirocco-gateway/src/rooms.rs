//! Room registry.
//!
//! Rooms are named multi-subscriber sets used for market-data and alert
//! fan-out. Membership is mutated only under the room lock; broadcast
//! takes a member snapshot and delivers fire-and-forget through each
//! member's reliable layer, so no global ordering is promised across
//! rooms.

use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

use crate::session::{SessionId, SessionRegistry};

/// The system alerts room.
pub const ALERTS_ROOM: &str = "alerts:system";

/// Prefix for per-symbol market-data rooms.
const MARKET_ROOM_PREFIX: &str = "market:";

/// Returns the market-data room name for a symbol.
#[must_use]
pub fn market_room(symbol: &str) -> String {
    format!("{MARKET_ROOM_PREFIX}{symbol}")
}

/// Returns true if the room name is a market-data room.
#[must_use]
pub fn is_market_room(room: &str) -> bool {
    room.starts_with(MARKET_ROOM_PREFIX)
}

/// Registry of named rooms.
///
/// A room exists exactly while it has members: the last leave destroys
/// it and a later join recreates it.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<SessionId>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to a room, creating the room if needed.
    pub fn join(&self, room: &str, session_id: SessionId) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(session_id);
        debug!(room, %session_id, "joined room");
    }

    /// Removes a session from a room, destroying the room when it empties.
    pub fn leave(&self, room: &str, session_id: SessionId) {
        let emptied = if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&session_id);
            members.is_empty()
        } else {
            false
        };
        if emptied {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    /// Removes a session from every room it is in.
    pub fn leave_all(&self, session_id: SessionId) {
        let rooms: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().contains(&session_id))
            .map(|entry| entry.key().clone())
            .collect();
        for room in rooms {
            self.leave(&room, session_id);
        }
    }

    /// Current members of a room.
    #[must_use]
    pub fn members(&self, room: &str) -> HashSet<SessionId> {
        self.rooms
            .get(room)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Rooms a session currently belongs to.
    #[must_use]
    pub fn rooms_of(&self, session_id: SessionId) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().contains(&session_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of live rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns true if no rooms exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Broadcasts serialized frame bytes to every current member.
    ///
    /// The member snapshot is taken at call time; joins after this instant
    /// do not receive the message. Delivery is fire-and-forget per member.
    /// Returns the number of members the frame was handed to.
    pub async fn broadcast(
        &self,
        room: &str,
        bytes: Vec<u8>,
        sessions: &SessionRegistry,
    ) -> usize {
        let snapshot = self.members(room);
        let mut delivered = 0;
        for session_id in snapshot {
            if let Some(session) = sessions.get(session_id) {
                if session.outbound().send_fire_and_forget(bytes.clone()).await {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Empties every room (used during shutdown drain).
    pub fn drain(&self) {
        self.rooms.clear();
    }
}
