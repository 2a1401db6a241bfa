//! Room Directory
//!
//! Maps room ids to member sets and owns every membership transition.
//!
//! ## Responsibilities
//!
//! - Room Lifecycle: rooms appear on the first successful join and vanish
//!   with their last member
//! - Capacity: at most [`MAX_ROOM_SIZE`] members per room
//! - Notifications: `user-joined`, `user-left` and `room-user-count` frames
//!   for the affected members
//! - Action Generation: return actions for the driver to execute, no I/O
//!
//! ## Invariants
//!
//! - Every room in the directory has `1..=MAX_ROOM_SIZE` members
//! - A session is a member of at most one room, and its registry
//!   back-reference names exactly that room
//! - Capacity check and insertion happen in the same `&mut self` call, so a
//!   third member can never be admitted

use std::collections::{BTreeSet, HashMap, hash_map::Entry};

use tandem_proto::{OutboundFrame, ProtocolError, RoomId, ServerMessage};

use crate::registry::{ConnectionRegistry, SessionId};

/// Maximum number of members in a room.
pub const MAX_ROOM_SIZE: usize = 2;

#[derive(Debug, Default)]
struct Room {
    members: BTreeSet<SessionId>,
}

/// Outcome of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinResult {
    /// The session is now a member of the room.
    Joined {
        /// Room that was joined
        room_id: RoomId,
        /// Room size after the join
        member_count: usize,
    },

    /// The room is at capacity; nothing about it changed.
    RoomFull {
        /// Room that was full
        room_id: RoomId,
        /// Capacity limit
        max_size: usize,
    },
}

/// Actions returned by RoomDirectory for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    /// Queue a frame to one member
    Deliver {
        /// Receiving session
        recipient: SessionId,
        /// Encoded frame
        frame: OutboundFrame,
    },

    /// A room was created by its first join
    RoomCreated {
        /// New room
        room_id: RoomId,
    },

    /// A room lost its last member and was removed
    RoomClosed {
        /// Removed room
        room_id: RoomId,
    },

    /// A session entered a room
    MemberJoined {
        /// Room entered
        room_id: RoomId,
        /// Joining session
        session_id: SessionId,
    },

    /// A session left a room, explicitly or by disconnecting
    MemberLeft {
        /// Room left
        room_id: RoomId,
        /// Departing session
        session_id: SessionId,
    },
}

/// Errors from RoomDirectory operations
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Session is not in the registry
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// A notification frame could not be encoded
    #[error("failed to encode notification: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Room id to member set mapping.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
}

impl RoomDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a room exists
    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members in a room. Zero for unknown rooms.
    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.members.len())
    }

    /// Members of a room in ascending session id order.
    pub fn members(&self, room_id: &str) -> impl Iterator<Item = SessionId> + '_ {
        self.rooms.get(room_id).into_iter().flat_map(|room| room.members.iter().copied())
    }

    /// All rooms with their sizes.
    pub fn rooms(&self) -> impl Iterator<Item = (&RoomId, usize)> {
        self.rooms.iter().map(|(id, room)| (id, room.members.len()))
    }

    /// Add a session to a room.
    ///
    /// 1. If the session is in a different room, leave it first
    /// 2. If the target room is full, return `RoomFull` without touching it
    /// 3. Otherwise insert, creating the room if needed
    /// 4. Send `user-joined` to the existing members, then `room-user-count`
    ///    to everyone in the room
    ///
    /// Joining the room the session is already in refreshes its display name
    /// and re-broadcasts the count.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::UnknownSession` if the session is not registered.
    pub fn join(
        &mut self,
        registry: &mut ConnectionRegistry,
        session_id: SessionId,
        room_id: RoomId,
        display_name: Option<String>,
    ) -> Result<(JoinResult, Vec<RoomAction>), RoomError> {
        let current_room =
            registry.get(session_id).ok_or(RoomError::UnknownSession(session_id))?.room_id.clone();

        if current_room.as_ref() == Some(&room_id) {
            return self.rejoin(registry, session_id, room_id, display_name);
        }

        let mut actions =
            if current_room.is_some() { self.leave(registry, session_id)? } else { Vec::new() };

        let occupancy = self.member_count(room_id.as_str());
        if occupancy >= MAX_ROOM_SIZE {
            return Ok((JoinResult::RoomFull { room_id, max_size: MAX_ROOM_SIZE }, actions));
        }

        let member_count = occupancy + 1;
        let user_joined =
            ServerMessage::UserJoined { username: display_name.clone() }.encode()?;
        let user_count = ServerMessage::RoomUserCount { count: member_count }.encode()?;

        let session =
            registry.get_mut(session_id).ok_or(RoomError::UnknownSession(session_id))?;
        session.room_id = Some(room_id.clone());
        session.display_name = display_name;

        let room = match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                actions.push(RoomAction::RoomCreated { room_id: room_id.clone() });
                entry.insert(Room::default())
            },
        };
        room.members.insert(session_id);
        actions.push(RoomAction::MemberJoined { room_id: room_id.clone(), session_id });

        actions.extend(self.broadcast(&room_id, &user_joined, Some(session_id)));
        actions.extend(self.broadcast(&room_id, &user_count, None));

        Ok((JoinResult::Joined { room_id, member_count }, actions))
    }

    fn rejoin(
        &mut self,
        registry: &mut ConnectionRegistry,
        session_id: SessionId,
        room_id: RoomId,
        display_name: Option<String>,
    ) -> Result<(JoinResult, Vec<RoomAction>), RoomError> {
        let member_count = self.member_count(room_id.as_str());
        let user_count = ServerMessage::RoomUserCount { count: member_count }.encode()?;

        let session =
            registry.get_mut(session_id).ok_or(RoomError::UnknownSession(session_id))?;
        session.display_name = display_name;

        let actions = self.broadcast(&room_id, &user_count, None);
        Ok((JoinResult::Joined { room_id, member_count }, actions))
    }

    /// Remove a session from its current room.
    ///
    /// No-op for idle or unknown sessions. Remaining members receive
    /// `user-left` and the new `room-user-count`; an emptied room is deleted.
    pub fn leave(
        &mut self,
        registry: &mut ConnectionRegistry,
        session_id: SessionId,
    ) -> Result<Vec<RoomAction>, RoomError> {
        let Some(session) = registry.get_mut(session_id) else {
            return Ok(Vec::new());
        };
        let Some(room_id) = session.room_id.clone() else {
            return Ok(Vec::new());
        };

        let remaining = self.member_count(room_id.as_str()).saturating_sub(1);
        let user_left =
            ServerMessage::UserLeft { username: session.display_name.clone() }.encode()?;
        let user_count = ServerMessage::RoomUserCount { count: remaining }.encode()?;

        session.room_id = None;

        let mut actions = Vec::new();
        let Entry::Occupied(mut entry) = self.rooms.entry(room_id.clone()) else {
            return Ok(actions);
        };

        entry.get_mut().members.remove(&session_id);
        actions.push(RoomAction::MemberLeft { room_id: room_id.clone(), session_id });

        if entry.get().members.is_empty() {
            entry.remove();
            actions.push(RoomAction::RoomClosed { room_id });
            return Ok(actions);
        }

        actions.extend(self.broadcast(&room_id, &user_left, None));
        actions.extend(self.broadcast(&room_id, &user_count, None));

        Ok(actions)
    }

    /// One delivery per current member of the room, minus `exclude`.
    ///
    /// Unknown rooms yield nothing. Whether each delivery succeeds is up to
    /// the executor; a failed recipient never affects the others.
    pub fn broadcast(
        &self,
        room_id: &RoomId,
        frame: &OutboundFrame,
        exclude: Option<SessionId>,
    ) -> Vec<RoomAction> {
        self.members(room_id.as_str())
            .filter(|member| Some(*member) != exclude)
            .map(|recipient| RoomAction::Deliver { recipient, frame: OutboundFrame::clone(frame) })
            .collect()
    }
}
