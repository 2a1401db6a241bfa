//! Inbound frame envelope.
//!
//! ## Design
//!
//! - Parse only the envelope: the relay needs the `type` tag to route and
//!   nothing else for relayed traffic.
//! - Keep the raw text: relayed frames must reach peers byte-identical, so
//!   the router forwards [`Frame::raw`] instead of re-serializing.

use std::sync::Arc;

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{OutboundFrame, ProtocolError};

/// Classification of a frame's `type` tag.
///
/// Only [`FrameKind::JoinRoom`] and [`FrameKind::LeaveRoom`] change relay
/// state. All other kinds, including [`FrameKind::Unknown`], are relayed to
/// the sender's room unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `join-room`
    JoinRoom,
    /// `leave-room`
    LeaveRoom,
    /// `chat`
    Chat,
    /// `offer`
    Offer,
    /// `answer`
    Answer,
    /// `ice-candidate`
    IceCandidate,
    /// `camera-state`
    CameraState,
    /// `call-started`
    CallStarted,
    /// `call-ended`
    CallEnded,
    /// Any other tag. Relayed opaquely for forward compatibility.
    Unknown,
}

impl FrameKind {
    /// Classify a `type` tag.
    pub fn from_type(frame_type: &str) -> Self {
        match frame_type {
            "join-room" => Self::JoinRoom,
            "leave-room" => Self::LeaveRoom,
            "chat" => Self::Chat,
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice-candidate" => Self::IceCandidate,
            "camera-state" => Self::CameraState,
            "call-started" => Self::CallStarted,
            "call-ended" => Self::CallEnded,
            _ => Self::Unknown,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// A parsed inbound frame.
#[derive(Debug, Clone)]
pub struct Frame {
    frame_type: String,
    payload: Option<Value>,
    raw: OutboundFrame,
}

impl Frame {
    /// Parse a text frame.
    ///
    /// Accepts any JSON object with a string `type`. `payload` may be
    /// absent or `null`; when present it must be an object. Unknown
    /// top-level fields are kept in the raw text and otherwise ignored.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(ProtocolError::InvalidEnvelope)?;

        if let Some(payload) = &envelope.payload {
            if !payload.is_object() {
                return Err(ProtocolError::PayloadNotObject { frame_type: envelope.frame_type });
            }
        }

        Ok(Self {
            frame_type: envelope.frame_type,
            payload: envelope.payload,
            raw: Arc::from(text),
        })
    }

    /// The `type` tag as sent.
    pub fn frame_type(&self) -> &str {
        &self.frame_type
    }

    /// Classified `type` tag.
    pub fn kind(&self) -> FrameKind {
        FrameKind::from_type(&self.frame_type)
    }

    /// The payload object, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Original text of the frame, for verbatim relay.
    pub fn raw(&self) -> &OutboundFrame {
        &self.raw
    }

    /// Decode the payload into a typed structure.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingPayload` if the frame has no payload.
    /// - `ProtocolError::InvalidPayload` if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| ProtocolError::MissingPayload { frame_type: self.frame_type.clone() })?;

        T::deserialize(payload).map_err(|e| ProtocolError::InvalidPayload {
            frame_type: self.frame_type.clone(),
            reason: e.to_string(),
        })
    }
}
