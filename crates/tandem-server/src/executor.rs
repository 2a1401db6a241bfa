//! Action execution.
//!
//! Delivery is best-effort per recipient: a session whose queue is full or
//! closed is skipped and the remaining actions still run. Sends never block,
//! so a slow peer cannot stall delivery to anyone else.

use std::collections::HashMap;

use tandem_proto::OutboundFrame;
use tokio::sync::mpsc;

use crate::{
    driver::{LogLevel, ServerAction},
    driver_error::ExecutorError,
    registry::SessionId,
};

/// Capacity of each session's outbound queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Performs the I/O side of [`ServerAction`]s.
pub trait ActionExecutor {
    /// Queue a frame for one session without blocking.
    fn send(&mut self, session_id: SessionId, frame: &OutboundFrame) -> Result<(), ExecutorError>;
}

/// Counts from one `execute_actions` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames queued
    pub delivered: usize,
    /// Frames dropped because the recipient was not writable
    pub skipped: usize,
}

/// Execute actions in order.
pub fn execute_actions<X: ActionExecutor>(
    executor: &mut X,
    actions: Vec<ServerAction>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, frame } => {
                match executor.send(session_id, &frame) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::debug!("Skipping recipient: {}", e);
                        report.skipped += 1;
                    },
                }
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
            },
        }
    }

    report
}

/// Production executor backed by per-session `mpsc` queues.
///
/// Each connection's writer task owns the receiving half and drains it into
/// the socket.
#[derive(Debug, Default)]
pub struct ChannelExecutor {
    outbound: HashMap<SessionId, mpsc::Sender<OutboundFrame>>,
}

impl ChannelExecutor {
    /// Create an executor with no attached sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session's outbound queue.
    pub fn attach(&mut self, session_id: SessionId, sender: mpsc::Sender<OutboundFrame>) {
        self.outbound.insert(session_id, sender);
    }

    /// Detach a session. Dropping the sender lets its writer drain and stop.
    pub fn detach(&mut self, session_id: SessionId) {
        self.outbound.remove(&session_id);
    }
}

impl ActionExecutor for ChannelExecutor {
    fn send(&mut self, session_id: SessionId, frame: &OutboundFrame) -> Result<(), ExecutorError> {
        let sender = self.outbound.get(&session_id).ok_or(ExecutorError::NotAttached(session_id))?;

        sender.try_send(OutboundFrame::clone(frame)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExecutorError::QueueFull(session_id),
            mpsc::error::TrySendError::Closed(_) => ExecutorError::Closed(session_id),
        })
    }
}
