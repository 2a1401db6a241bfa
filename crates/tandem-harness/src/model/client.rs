//! Model client: one connection's view of the relay.

use serde_json::Value;

use super::operation::{ModelRoomId, parse_room_name};

/// A frame as a client observes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMessage {
    /// `room-joined`
    RoomJoined(ModelRoomId),
    /// `room-full`
    RoomFull {
        /// Rejected room
        room_id: ModelRoomId,
        /// Advertised capacity
        max_size: usize,
    },
    /// `user-joined`
    UserJoined(Option<String>),
    /// `user-left`
    UserLeft(Option<String>),
    /// `room-user-count`
    Count(usize),
    /// Relayed frame text, verbatim
    Relayed(String),
}

impl ModelMessage {
    /// Classify a delivered frame.
    ///
    /// Relay-originated types are decoded; everything else is a relayed
    /// frame and kept as exact text.
    pub fn from_wire(text: &str) -> Self {
        let relayed = || Self::Relayed(text.to_string());

        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return relayed();
        };
        let payload = &value["payload"];
        let room = || payload["roomId"].as_str().and_then(parse_room_name);
        let name = || payload["username"].as_str().map(ToString::to_string);
        let number = |key: &str| payload[key].as_u64().and_then(|n| usize::try_from(n).ok());

        let decoded = match value["type"].as_str() {
            Some("room-joined") => room().map(Self::RoomJoined),
            Some("room-full") => room()
                .zip(number("maxSize"))
                .map(|(room_id, max_size)| Self::RoomFull { room_id, max_size }),
            Some("user-joined") => Some(Self::UserJoined(name())),
            Some("user-left") => Some(Self::UserLeft(name())),
            Some("room-user-count") => number("count").map(Self::Count),
            _ => None,
        };

        decoded.unwrap_or_else(relayed)
    }
}

/// Model of a single client connection.
#[derive(Debug, Clone, Default)]
pub struct ModelClient {
    connected: bool,
    room: Option<ModelRoomId>,
    name: Option<String>,
    inbox: Vec<ModelMessage>,
}

impl ModelClient {
    /// A freshly connected, idle client.
    pub fn connected() -> Self {
        Self { connected: true, ..Self::default() }
    }

    /// Whether the client has an open connection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current room, if any.
    pub fn room(&self) -> Option<ModelRoomId> {
        self.room
    }

    /// Display name from the most recent join.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Everything delivered since connecting.
    pub fn inbox(&self) -> &[ModelMessage] {
        &self.inbox
    }

    pub(super) fn set_room(&mut self, room: Option<ModelRoomId>) {
        self.room = room;
    }

    pub(super) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub(super) fn receive(&mut self, message: ModelMessage) {
        self.inbox.push(message);
    }

    pub(super) fn disconnect(&mut self) {
        *self = Self::default();
    }
}
