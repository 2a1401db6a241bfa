//! Typed payloads the relay reads or writes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{OutboundFrame, ProtocolError, RoomId};

/// Payload of an inbound `join-room` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    /// Room to join.
    pub room_id: RoomId,
    /// Display name announced to the other member.
    #[serde(default)]
    pub username: Option<String>,
}

/// Frames generated by the relay itself.
///
/// Serialized with the same `{type, payload}` envelope clients use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Join acknowledged. Sent to the joiner.
    RoomJoined {
        /// Room that was joined.
        room_id: RoomId,
    },

    /// Join rejected because the room is at capacity. Sent to the rejected
    /// joiner only.
    RoomFull {
        /// Room that was full.
        room_id: RoomId,
        /// Capacity limit.
        max_size: usize,
    },

    /// Another participant joined. Sent to the existing members.
    UserJoined {
        /// Display name of the joiner.
        username: Option<String>,
    },

    /// A participant left or disconnected. Sent to the remaining members.
    UserLeft {
        /// Display name of the participant that left.
        username: Option<String>,
    },

    /// Current room size. Sent to every member after each membership change.
    RoomUserCount {
        /// Number of members in the room.
        count: usize,
    },
}

impl ServerMessage {
    /// Wire `type` tag of this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::RoomJoined { .. } => "room-joined",
            Self::RoomFull { .. } => "room-full",
            Self::UserJoined { .. } => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::RoomUserCount { .. } => "room-user-count",
        }
    }

    /// Encode to frame text.
    pub fn encode(&self) -> Result<OutboundFrame, ProtocolError> {
        serde_json::to_string(self).map(Arc::from).map_err(|e| ProtocolError::Encode {
            message_type: self.message_type(),
            reason: e.to_string(),
        })
    }
}
