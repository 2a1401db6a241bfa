//! Tandem wire protocol.
//!
//! Every unit of communication between a client and the relay is a single
//! JSON text frame shaped as `{ "type": <string>, "payload"?: <object> }`.
//!
//! The relay only ever looks at the `type` tag of inbound frames, plus the
//! payload of `join-room`. Everything else is forwarded verbatim, so
//! [`Frame`] keeps the original text next to the parsed envelope.
//!
//! # Components
//!
//! - [`Frame`]: parsed inbound envelope plus raw text
//! - [`FrameKind`]: classification of the `type` tag
//! - [`JoinRoom`]: the one inbound payload the relay interprets
//! - [`ServerMessage`]: frames generated by the relay itself
//! - [`RoomId`]: validated, case-sensitive room identifier

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod messages;
mod room_id;

use std::sync::Arc;

pub use error::ProtocolError;
pub use frame::{Frame, FrameKind};
pub use messages::{JoinRoom, ServerMessage};
pub use room_id::RoomId;

/// Encoded frame text ready to be queued to one or more connections.
///
/// Shared so that a broadcast encodes once and fans out by reference.
pub type OutboundFrame = Arc<str>;
