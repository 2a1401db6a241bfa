//! Driver and executor error types.

use tandem_proto::ProtocolError;

use crate::{registry::SessionId, room_directory::RoomError};

/// Errors from [`ServerDriver`](crate::ServerDriver) event processing.
///
/// None of these end the relay; the runtime logs them and keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Inbound frame could not be decoded. The frame is discarded and the
    /// connection stays open.
    #[error("malformed frame from session {session_id}: {source}")]
    MalformedFrame {
        /// Sending session
        session_id: SessionId,
        /// Decode failure
        #[source]
        source: ProtocolError,
    },

    /// Event for a session that is not registered (never accepted, or
    /// already closed).
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Connection limit reached.
    #[error("connection limit reached ({limit})")]
    TooManyConnections {
        /// Configured limit
        limit: usize,
    },

    /// A reply frame could not be encoded.
    #[error("failed to encode reply: {0}")]
    Encode(#[source] ProtocolError),

    /// Room directory failure.
    #[error("room error: {0}")]
    Room(#[from] RoomError),
}

impl DriverError {
    /// Returns true if the error was caused by client input rather than
    /// relay state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. } | Self::UnknownSession(_))
    }
}

/// Errors from delivering a frame to one session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// No outbound queue is attached for the session.
    #[error("session {0} has no outbound queue")]
    NotAttached(SessionId),

    /// The session's outbound queue is full.
    #[error("outbound queue full for session {0}")]
    QueueFull(SessionId),

    /// The session's writer has shut down.
    #[error("outbound queue closed for session {0}")]
    Closed(SessionId),
}
