//! Operations for model-based testing.
//!
//! Operations represent everything a client can do to the relay. They are
//! generated randomly by proptest and applied to both the model and the
//! simulated server.

use arbitrary::Arbitrary;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Room identifier (uses u8 to keep test space manageable).
pub type ModelRoomId = u8;

/// Room name on the wire for a model room.
pub fn room_name(room_id: ModelRoomId) -> String {
    format!("room-{room_id}")
}

/// Model room for a room name on the wire.
pub fn parse_room_name(name: &str) -> Option<ModelRoomId> {
    name.strip_prefix("room-")?.parse().ok()
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client sends `join-room`.
    Join {
        /// Client performing the operation.
        client_id: ClientId,
        /// Room to join.
        room_id: ModelRoomId,
        /// Display name seed; `None` omits the username.
        name: Option<u8>,
    },

    /// Client sends `leave-room`.
    Leave {
        /// Client leaving.
        client_id: ClientId,
    },

    /// Client sends a relayed frame.
    Send {
        /// Client sending the frame.
        client_id: ClientId,
        /// Frame content.
        content: SmallMessage,
    },

    /// Client sends text that is not a valid frame.
    SendMalformed {
        /// Client sending the frame.
        client_id: ClientId,
    },

    /// Client's connection closes.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },

    /// Client opens a fresh connection.
    ///
    /// No-op for a client that is already connected.
    Reconnect {
        /// Client reconnecting.
        client_id: ClientId,
    },
}

impl Operation {
    /// Client the operation targets.
    pub fn client_id(&self) -> ClientId {
        match self {
            Self::Join { client_id, .. }
            | Self::Leave { client_id }
            | Self::Send { client_id, .. }
            | Self::SendMalformed { client_id }
            | Self::Disconnect { client_id }
            | Self::Reconnect { client_id } => *client_id,
        }
    }

    /// Same operation with the client id wrapped into `0..num_clients`.
    #[must_use]
    pub fn clamp_client(self, num_clients: usize) -> Self {
        let clamp = |client_id: ClientId| {
            let num_clients = u8::try_from(num_clients).unwrap_or(u8::MAX).max(1);
            client_id % num_clients
        };

        match self {
            Self::Join { client_id, room_id, name } => {
                Self::Join { client_id: clamp(client_id), room_id, name }
            },
            Self::Leave { client_id } => Self::Leave { client_id: clamp(client_id) },
            Self::Send { client_id, content } => {
                Self::Send { client_id: clamp(client_id), content }
            },
            Self::SendMalformed { client_id } => {
                Self::SendMalformed { client_id: clamp(client_id) }
            },
            Self::Disconnect { client_id } => Self::Disconnect { client_id: clamp(client_id) },
            Self::Reconnect { client_id } => Self::Reconnect { client_id: clamp(client_id) },
        }
    }

    /// The `join-room` frame text for a join.
    pub fn join_frame(room_id: ModelRoomId, name: Option<u8>) -> String {
        let mut payload = serde_json::Map::new();
        payload.insert("roomId".to_string(), room_name(room_id).into());
        if let Some(name) = display_name(name) {
            payload.insert("username".to_string(), name.into());
        }
        serde_json::json!({ "type": "join-room", "payload": payload }).to_string()
    }
}

/// Display name for a name seed.
pub fn display_name(name: Option<u8>) -> Option<String> {
    name.map(|n| format!("user-{n}"))
}

/// Small relayed frame for testing.
///
/// The frame type and content are deterministic from the fields.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallMessage {
    /// Content seed.
    pub seed: u8,
    /// Frame type selector.
    pub kind: u8,
}

impl SmallMessage {
    /// Frame types a client may relay, including one the relay does not know.
    const TYPES: [&'static str; 8] = [
        "chat",
        "offer",
        "answer",
        "ice-candidate",
        "camera-state",
        "call-started",
        "call-ended",
        "screen-share",
    ];

    /// Expand to frame text.
    ///
    /// Odd seeds add irregular whitespace so verbatim relay is observable.
    pub fn to_frame(&self) -> String {
        let frame_type = Self::TYPES[usize::from(self.kind) % Self::TYPES.len()];
        if self.seed % 2 == 1 {
            format!(r#"{{ "type" : "{frame_type}" , "payload" : {{ "seed" : {} }} }}"#, self.seed)
        } else {
            format!(r#"{{"type":"{frame_type}","payload":{{"seed":{}}}}}"#, self.seed)
        }
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation was accepted.
    Ok,

    /// Operation was refused.
    Error(OperationError),
}

/// Refusals that can occur during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// The frame was dropped as malformed.
    Malformed,

    /// The client has no open connection.
    NotConnected,

    /// Invalid client ID.
    InvalidClient,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
