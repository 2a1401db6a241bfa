//! Connection registry.
//!
//! Tracks every live session and its per-connection state: display name,
//! current room, and connection time. The registry never decides room
//! membership; a session's `room_id` is a back-reference maintained by the
//! [`RoomDirectory`](crate::RoomDirectory), whose member sets are
//! authoritative.

use std::{collections::HashMap, time::Instant};

use tandem_proto::RoomId;

use crate::env::Environment;

/// Identifier of one accepted connection.
pub type SessionId = u64;

/// Per-connection session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session identifier
    pub session_id: SessionId,
    /// Display name from the most recent `join-room`
    pub display_name: Option<String>,
    /// Room the session currently belongs to
    pub room_id: Option<RoomId>,
    /// When the connection was accepted
    pub connected_at: Instant,
}

impl SessionInfo {
    /// A session with no room is idle.
    pub fn is_idle(&self) -> bool {
        self.room_id.is_none()
    }
}

/// Registry of live sessions.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<SessionId, SessionInfo>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh identity for a newly accepted connection.
    ///
    /// The id is drawn from the environment's RNG. Zero and ids already in
    /// use are skipped by probing forward, so this never fails.
    pub fn register<E: Environment>(&mut self, env: &E) -> SessionId {
        let mut session_id = env.random_u64();
        while session_id == 0 || self.sessions.contains_key(&session_id) {
            session_id = session_id.wrapping_add(1);
        }

        self.sessions.insert(
            session_id,
            SessionInfo { session_id, display_name: None, room_id: None, connected_at: env.now() },
        );
        session_id
    }

    /// Remove a session.
    ///
    /// Returns the removed state, or `None` if the session was already gone.
    /// Callers run the implicit room leave first; see
    /// [`ServerDriver`](crate::ServerDriver).
    pub fn unregister(&mut self, session_id: SessionId) -> Option<SessionInfo> {
        self.sessions.remove(&session_id)
    }

    /// Look up a session.
    pub fn get(&self, session_id: SessionId) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    pub(crate) fn get_mut(&mut self, session_id: SessionId) -> Option<&mut SessionInfo> {
        self.sessions.get_mut(&session_id)
    }

    /// Whether the session is registered.
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterate over all live sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &SessionInfo> {
        self.sessions.values()
    }
}
