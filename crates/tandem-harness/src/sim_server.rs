//! Simulated relay: the real driver with a recording executor.

use std::collections::{BTreeMap, HashMap, HashSet};

use tandem_proto::OutboundFrame;
use tandem_server::{
    ActionExecutor, DeliveryReport, DriverConfig, DriverError, ExecutorError, ServerDriver,
    ServerEvent, SessionId, execute_actions,
};

use crate::{
    model::{
        ClientId, ModelMessage, ObservableState, Operation, OperationError, OperationResult,
        operation::parse_room_name,
    },
    sim_env::SimEnv,
};

/// Executor that records every delivered frame per session.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    delivered: HashMap<SessionId, Vec<OutboundFrame>>,
    unwritable: HashSet<SessionId>,
}

impl RecordingExecutor {
    /// Make sends to `session_id` fail as if its queue were full.
    pub fn block(&mut self, session_id: SessionId) {
        self.unwritable.insert(session_id);
    }

    /// Frames delivered to a session, oldest first.
    pub fn delivered(&self, session_id: SessionId) -> &[OutboundFrame] {
        self.delivered.get(&session_id).map_or(&[][..], Vec::as_slice)
    }

    /// Drop everything recorded for a session.
    pub fn forget(&mut self, session_id: SessionId) {
        self.delivered.remove(&session_id);
        self.unwritable.remove(&session_id);
    }
}

impl ActionExecutor for RecordingExecutor {
    fn send(&mut self, session_id: SessionId, frame: &OutboundFrame) -> Result<(), ExecutorError> {
        if self.unwritable.contains(&session_id) {
            return Err(ExecutorError::QueueFull(session_id));
        }
        self.delivered.entry(session_id).or_default().push(OutboundFrame::clone(frame));
        Ok(())
    }
}

/// `ServerDriver` plus one connection slot per model client.
pub struct SimServer {
    env: SimEnv,
    driver: ServerDriver<SimEnv>,
    executor: RecordingExecutor,
    slots: Vec<Option<SessionId>>,
}

impl SimServer {
    /// Server with `num_clients` connected clients.
    pub fn new(num_clients: usize, seed: u64) -> Result<Self, DriverError> {
        let env = SimEnv::with_seed(seed);
        let driver = ServerDriver::new(env.clone(), DriverConfig::default());
        let mut server = Self {
            env,
            driver,
            executor: RecordingExecutor::default(),
            slots: vec![None; num_clients],
        };

        for slot in &mut server.slots {
            *slot = Some(server.driver.accept_connection()?);
        }
        Ok(server)
    }

    /// The simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The driver under test.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// The recording executor.
    pub fn executor_mut(&mut self) -> &mut RecordingExecutor {
        &mut self.executor
    }

    /// Session currently held by a client.
    pub fn session(&self, client_id: ClientId) -> Option<SessionId> {
        self.slots.get(usize::from(client_id)).copied().flatten()
    }

    /// Feed one event and execute its actions.
    pub fn process(&mut self, event: ServerEvent) -> Result<DeliveryReport, DriverError> {
        let actions = self.driver.process_event(event)?;
        Ok(execute_actions(&mut self.executor, actions))
    }

    /// Apply a model operation to the real driver.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let client_id = op.client_id();
        let Some(slot) = self.slots.get(usize::from(client_id)).copied() else {
            return OperationResult::Error(OperationError::InvalidClient);
        };

        if let Operation::Reconnect { .. } = op {
            if slot.is_none() {
                match self.driver.accept_connection() {
                    Ok(session_id) => self.slots[usize::from(client_id)] = Some(session_id),
                    Err(_) => return OperationResult::Error(OperationError::NotConnected),
                }
            }
            return OperationResult::Ok;
        }

        let Some(session_id) = slot else {
            return OperationResult::Error(OperationError::NotConnected);
        };

        let event = match op {
            Operation::Join { room_id, name, .. } => {
                frame_event(session_id, Operation::join_frame(*room_id, *name))
            },
            Operation::Leave { .. } => {
                frame_event(session_id, r#"{"type":"leave-room","payload":{}}"#.to_string())
            },
            Operation::Send { content, .. } => frame_event(session_id, content.to_frame()),
            Operation::SendMalformed { .. } => frame_event(session_id, "{\"payload\":".to_string()),
            Operation::Disconnect { .. } => ServerEvent::ConnectionClosed {
                session_id,
                reason: "simulated disconnect".to_string(),
            },
            Operation::Reconnect { .. } => return OperationResult::Ok,
        };

        let result = self.process(event);

        if let Operation::Disconnect { .. } = op {
            self.slots[usize::from(client_id)] = None;
            self.executor.forget(session_id);
        }

        match result {
            Ok(_) => OperationResult::Ok,
            Err(DriverError::MalformedFrame { .. }) => {
                OperationResult::Error(OperationError::Malformed)
            },
            Err(_) => OperationResult::Error(OperationError::NotConnected),
        }
    }

    /// Frames a client has received since connecting, classified.
    pub fn inbox(&self, client_id: ClientId) -> Vec<ModelMessage> {
        self.session(client_id)
            .map(|session_id| {
                self.executor
                    .delivered(session_id)
                    .iter()
                    .map(|frame| ModelMessage::from_wire(frame))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot comparable with `ModelWorld::observable_state`.
    pub fn observable_state(&self) -> ObservableState {
        let registry = self.driver.registry();
        let client_rooms = self
            .slots
            .iter()
            .map(|slot| {
                slot.and_then(|session_id| registry.get(session_id))
                    .and_then(|session| session.room_id.as_ref())
                    .and_then(|room_id| parse_room_name(room_id.as_str()))
            })
            .collect();

        let room_sizes: BTreeMap<_, _> = self
            .driver
            .rooms()
            .rooms()
            .filter_map(|(room_id, size)| parse_room_name(room_id.as_str()).map(|id| (id, size)))
            .collect();

        ObservableState {
            connected: self.slots.iter().map(Option::is_some).collect(),
            client_rooms,
            display_names: (0..self.slots.len())
                .filter_map(|index| ClientId::try_from(index).ok())
                .map(|client_id| self.display_name(client_id))
                .collect(),
            inboxes: (0..self.slots.len())
                .filter_map(|index| ClientId::try_from(index).ok())
                .map(|client_id| self.inbox(client_id))
                .collect(),
            room_sizes,
        }
    }

    /// Display name the registry holds for a client.
    pub fn display_name(&self, client_id: ClientId) -> Option<String> {
        self.session(client_id)
            .and_then(|session_id| self.driver.registry().get(session_id))
            .and_then(|session| session.display_name.clone())
    }
}

fn frame_event(session_id: SessionId, text: String) -> ServerEvent {
    ServerEvent::FrameReceived { session_id, text }
}
