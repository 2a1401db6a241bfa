//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding or encoding frames.
///
/// None of these are fatal to a connection: the relay drops the offending
/// frame and keeps serving.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Text is not a JSON object with a string `type` field.
    #[error("invalid frame envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    /// `payload` is present but is not a JSON object.
    #[error("payload of {frame_type} frame is not an object")]
    PayloadNotObject {
        /// Type tag of the offending frame.
        frame_type: String,
    },

    /// Frame requires a payload but none was supplied.
    #[error("missing payload for {frame_type} frame")]
    MissingPayload {
        /// Type tag of the offending frame.
        frame_type: String,
    },

    /// Payload does not match the expected shape.
    #[error("invalid payload for {frame_type} frame: {reason}")]
    InvalidPayload {
        /// Type tag of the offending frame.
        frame_type: String,
        /// Decoder message.
        reason: String,
    },

    /// Room identifiers must be non-empty.
    #[error("room id must not be empty")]
    EmptyRoomId,

    /// Only text frames carry protocol messages.
    #[error("binary frames are not supported")]
    BinaryFrame,

    /// Serializing a server message failed.
    #[error("failed to encode {message_type}: {reason}")]
    Encode {
        /// Type tag of the message being encoded.
        message_type: &'static str,
        /// Encoder message.
        reason: String,
    },
}
