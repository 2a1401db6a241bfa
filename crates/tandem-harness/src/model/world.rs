//! Model world - orchestrates clients and rooms.
//!
//! The world is the top-level container that manages the model state and
//! applies operations. It's the oracle against which `SimServer` is
//! verified.

use std::collections::BTreeMap;

use tandem_server::MAX_ROOM_SIZE;

use super::{
    client::{ModelClient, ModelMessage},
    operation::{ClientId, ModelRoomId, Operation, OperationError, OperationResult, display_name},
};

/// Observable state for oracle comparison.
///
/// This is the subset of world state that can be compared against the real
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-client connection flag.
    pub connected: Vec<bool>,
    /// Per-client current room.
    pub client_rooms: Vec<Option<ModelRoomId>>,
    /// Per-client display name held by the relay.
    pub display_names: Vec<Option<String>>,
    /// Per-client delivered frames, oldest first.
    pub inboxes: Vec<Vec<ModelMessage>>,
    /// Occupancy of every existing room.
    pub room_sizes: BTreeMap<ModelRoomId, usize>,
}

/// Reference model of the relay.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    clients: Vec<ModelClient>,
    /// Members per room, in join order.
    rooms: BTreeMap<ModelRoomId, Vec<ClientId>>,
}

impl ModelWorld {
    /// World with `num_clients` connected, idle clients.
    pub fn new(num_clients: usize) -> Self {
        Self { clients: vec![ModelClient::connected(); num_clients], rooms: BTreeMap::new() }
    }

    /// Client state, if the id is valid.
    pub fn client(&self, client_id: ClientId) -> Option<&ModelClient> {
        self.clients.get(usize::from(client_id))
    }

    /// Members of a room.
    pub fn members(&self, room_id: ModelRoomId) -> &[ClientId] {
        self.rooms.get(&room_id).map_or(&[][..], Vec::as_slice)
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let client_id = op.client_id();
        let Some(client) = self.clients.get_mut(usize::from(client_id)) else {
            return OperationResult::Error(OperationError::InvalidClient);
        };

        if let Operation::Reconnect { .. } = op {
            if !client.is_connected() {
                *client = ModelClient::connected();
            }
            return OperationResult::Ok;
        }

        if !client.is_connected() {
            return OperationResult::Error(OperationError::NotConnected);
        }

        match op {
            Operation::Join { room_id, name, .. } => {
                self.apply_join(client_id, *room_id, display_name(*name));
            },
            Operation::Leave { .. } => self.apply_leave(client_id),
            Operation::Send { content, .. } => self.apply_send(client_id, content.to_frame()),
            Operation::SendMalformed { .. } => {
                return OperationResult::Error(OperationError::Malformed);
            },
            Operation::Disconnect { .. } => {
                self.apply_leave(client_id);
                self.clients[usize::from(client_id)].disconnect();
            },
            Operation::Reconnect { .. } => {},
        }

        OperationResult::Ok
    }

    fn apply_join(&mut self, client_id: ClientId, room_id: ModelRoomId, name: Option<String>) {
        let index = usize::from(client_id);

        if self.clients[index].room() == Some(room_id) {
            self.clients[index].set_name(name);
            self.clients[index].receive(ModelMessage::RoomJoined(room_id));
            let count = self.members(room_id).len();
            self.deliver(room_id, None, &ModelMessage::Count(count));
            return;
        }

        self.apply_leave(client_id);

        if self.members(room_id).len() >= MAX_ROOM_SIZE {
            self.clients[index]
                .receive(ModelMessage::RoomFull { room_id, max_size: MAX_ROOM_SIZE });
            return;
        }

        self.clients[index].set_room(Some(room_id));
        self.clients[index].set_name(name.clone());
        self.clients[index].receive(ModelMessage::RoomJoined(room_id));

        let members = self.rooms.entry(room_id).or_default();
        members.push(client_id);
        let count = members.len();

        self.deliver(room_id, Some(client_id), &ModelMessage::UserJoined(name));
        self.deliver(room_id, None, &ModelMessage::Count(count));
    }

    fn apply_leave(&mut self, client_id: ClientId) {
        let index = usize::from(client_id);
        let Some(room_id) = self.clients[index].room() else {
            return;
        };
        self.clients[index].set_room(None);

        let Some(members) = self.rooms.get_mut(&room_id) else {
            return;
        };
        members.retain(|member| *member != client_id);
        let remaining = members.len();

        if remaining == 0 {
            self.rooms.remove(&room_id);
            return;
        }

        let name = self.clients[index].name().map(ToString::to_string);
        self.deliver(room_id, None, &ModelMessage::UserLeft(name));
        self.deliver(room_id, None, &ModelMessage::Count(remaining));
    }

    fn apply_send(&mut self, client_id: ClientId, frame: String) {
        if let Some(room_id) = self.clients[usize::from(client_id)].room() {
            self.deliver(room_id, Some(client_id), &ModelMessage::Relayed(frame));
        }
    }

    fn deliver(&mut self, room_id: ModelRoomId, exclude: Option<ClientId>, message: &ModelMessage) {
        let recipients: Vec<_> =
            self.members(room_id).iter().copied().filter(|m| Some(*m) != exclude).collect();
        for recipient in recipients {
            self.clients[usize::from(recipient)].receive(message.clone());
        }
    }

    /// Snapshot for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            connected: self.clients.iter().map(ModelClient::is_connected).collect(),
            client_rooms: self.clients.iter().map(ModelClient::room).collect(),
            display_names: self
                .clients
                .iter()
                .map(|client| client.name().map(ToString::to_string))
                .collect(),
            inboxes: self.clients.iter().map(|client| client.inbox().to_vec()).collect(),
            room_sizes: self
                .rooms
                .iter()
                .map(|(room_id, members)| (*room_id, members.len()))
                .collect(),
        }
    }
}
