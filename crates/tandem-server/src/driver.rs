//! Server driver: the message router.
//!
//! ## Event/Action Pattern
//!
//! The driver follows a Sans-IO pattern:
//! 1. The runtime turns transport callbacks into `ServerEvent`s
//! 2. `ServerDriver::process_event()` returns `ServerAction`s
//! 3. An `ActionExecutor` (runtime-specific) performs them
//!
//! The runtime processes one event at a time under a single lock, which is
//! what makes each `join` capacity check atomic with respect to every other
//! membership change.
//!
//! ## Session lifecycle
//!
//! ```text
//! accept_connection()      join-room          leave-room / join other
//!   ──────────────▶ Idle ───────────▶ InRoom ──────────────────────▶ Idle
//!                    │                  │
//!                    └──── ConnectionClosed ────▶ Terminated (absorbing)
//! ```

use std::time::Duration;

use tandem_proto::{Frame, FrameKind, JoinRoom, OutboundFrame, ProtocolError, ServerMessage};

use crate::{
    driver_error::DriverError,
    env::Environment,
    registry::{ConnectionRegistry, SessionId},
    room_directory::{JoinResult, RoomAction, RoomDirectory},
};

/// Driver limits.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent sessions
    pub max_connections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Transport events fed into the driver.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A text frame arrived on a session
    FrameReceived {
        /// Sending session
        session_id: SessionId,
        /// Frame text as received
        text: String,
    },

    /// A binary frame arrived on a session
    BinaryReceived {
        /// Sending session
        session_id: SessionId,
    },

    /// The transport closed
    ConnectionClosed {
        /// Closed session
        session_id: SessionId,
        /// Why the transport closed
        reason: String,
    },
}

/// Severity of a `ServerAction::Log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Per-frame detail
    Debug,
    /// Lifecycle events
    Info,
}

/// Actions returned by the driver for the runtime to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Queue a frame to one session
    SendToSession {
        /// Recipient
        session_id: SessionId,
        /// Encoded frame
        frame: OutboundFrame,
    },

    /// Emit a log line
    Log {
        /// Severity
        level: LogLevel,
        /// Message
        message: String,
    },
}

/// Sans-IO relay orchestrator.
///
/// Owns the connection registry and the room directory; these are the only
/// shared mutable state in the relay.
#[derive(Debug)]
pub struct ServerDriver<E>
where
    E: Environment,
{
    env: E,
    config: DriverConfig,
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a driver with no sessions and no rooms.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self { env, config, registry: ConnectionRegistry::new(), rooms: RoomDirectory::new() }
    }

    /// Live sessions.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Current rooms.
    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Sessions currently in a room.
    pub fn sessions_in_room<'a>(
        &'a self,
        room_id: &'a str,
    ) -> impl Iterator<Item = SessionId> + 'a {
        self.rooms.members(room_id)
    }

    /// Register a newly accepted connection.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::TooManyConnections` at the connection limit; the
    /// runtime closes the socket.
    pub fn accept_connection(&mut self) -> Result<SessionId, DriverError> {
        if self.registry.len() >= self.config.max_connections {
            return Err(DriverError::TooManyConnections { limit: self.config.max_connections });
        }

        Ok(self.registry.register(&self.env))
    }

    /// Process one transport event.
    ///
    /// # Errors
    ///
    /// - `DriverError::MalformedFrame` if a frame fails to decode. Nothing was
    ///   changed and nothing is sent back.
    /// - `DriverError::UnknownSession` for frames on a session that is not
    ///   registered.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::FrameReceived { session_id, text } => self.handle_frame(session_id, &text),
            ServerEvent::BinaryReceived { session_id } => {
                if !self.registry.contains(session_id) {
                    return Err(DriverError::UnknownSession(session_id));
                }
                Err(DriverError::MalformedFrame { session_id, source: ProtocolError::BinaryFrame })
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                self.handle_close(session_id, &reason)
            },
        }
    }

    fn handle_frame(
        &mut self,
        session_id: SessionId,
        text: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.contains(session_id) {
            return Err(DriverError::UnknownSession(session_id));
        }

        let frame = Frame::parse(text)
            .map_err(|source| DriverError::MalformedFrame { session_id, source })?;

        match frame.kind() {
            FrameKind::JoinRoom => self.handle_join(session_id, &frame),
            FrameKind::LeaveRoom => {
                let actions = self.rooms.leave(&mut self.registry, session_id)?;
                Ok(into_server_actions(actions))
            },
            _ => Ok(self.relay(session_id, &frame)),
        }
    }

    fn handle_join(
        &mut self,
        session_id: SessionId,
        frame: &Frame,
    ) -> Result<Vec<ServerAction>, DriverError> {
        let JoinRoom { room_id, username } = frame
            .payload_as()
            .map_err(|source| DriverError::MalformedFrame { session_id, source })?;

        let (result, room_actions) =
            self.rooms.join(&mut self.registry, session_id, room_id, username)?;

        match result {
            JoinResult::Joined { room_id, .. } => {
                let ack =
                    ServerMessage::RoomJoined { room_id }.encode().map_err(DriverError::Encode)?;

                let mut actions = vec![ServerAction::SendToSession { session_id, frame: ack }];
                actions.extend(into_server_actions(room_actions));
                Ok(actions)
            },
            JoinResult::RoomFull { room_id, max_size } => {
                let message = format!("session {session_id} rejected from full room {room_id}");
                let notice = ServerMessage::RoomFull { room_id, max_size }
                    .encode()
                    .map_err(DriverError::Encode)?;

                let mut actions = into_server_actions(room_actions);
                actions.push(ServerAction::SendToSession { session_id, frame: notice });
                actions.push(ServerAction::Log { level: LogLevel::Info, message });
                Ok(actions)
            },
        }
    }

    /// Forward a frame verbatim to the other members of the sender's room.
    fn relay(&self, session_id: SessionId, frame: &Frame) -> Vec<ServerAction> {
        let room_id = self.registry.get(session_id).and_then(|session| session.room_id.as_ref());

        let Some(room_id) = room_id else {
            return vec![ServerAction::Log {
                level: LogLevel::Debug,
                message: format!(
                    "dropping {} frame from idle session {}",
                    frame.frame_type(),
                    session_id
                ),
            }];
        };

        let deliveries = self.rooms.broadcast(room_id, frame.raw(), Some(session_id));
        let mut actions = Vec::with_capacity(deliveries.len() + 1);
        actions.push(ServerAction::Log {
            level: LogLevel::Debug,
            message: format!(
                "relaying {} frame from session {} to {} peer(s) in room {}",
                frame.frame_type(),
                session_id,
                deliveries.len(),
                room_id
            ),
        });
        actions.extend(into_server_actions(deliveries));
        actions
    }

    /// Implicit leave, then unregister. A repeated close is a no-op.
    fn handle_close(
        &mut self,
        session_id: SessionId,
        reason: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.contains(session_id) {
            return Ok(Vec::new());
        }

        let mut actions = into_server_actions(self.rooms.leave(&mut self.registry, session_id)?);

        if let Some(session) = self.registry.unregister(session_id) {
            let lifetime: Duration = self.env.now().saturating_duration_since(session.connected_at);
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: format!("session {session_id} closed after {lifetime:?}: {reason}"),
            });
        }

        Ok(actions)
    }
}

fn into_server_actions(actions: Vec<RoomAction>) -> Vec<ServerAction> {
    actions
        .into_iter()
        .map(|action| match action {
            RoomAction::Deliver { recipient, frame } => {
                ServerAction::SendToSession { session_id: recipient, frame }
            },
            RoomAction::RoomCreated { room_id } => {
                ServerAction::Log {
                    level: LogLevel::Info,
                    message: format!("room {room_id} created"),
                }
            },
            RoomAction::RoomClosed { room_id } => {
                ServerAction::Log {
                    level: LogLevel::Info,
                    message: format!("room {room_id} closed"),
                }
            },
            RoomAction::MemberJoined { room_id, session_id } => ServerAction::Log {
                level: LogLevel::Info,
                message: format!("session {session_id} joined room {room_id}"),
            },
            RoomAction::MemberLeft { room_id, session_id } => ServerAction::Log {
                level: LogLevel::Info,
                message: format!("session {session_id} left room {room_id}"),
            },
        })
        .collect()
}
