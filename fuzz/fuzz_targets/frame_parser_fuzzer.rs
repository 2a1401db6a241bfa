//! Fuzz target for [`Frame::parse`]
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary text
//! - A parsed frame keeps its exact input text for relay
//! - A present payload is always a JSON object
//! - `join-room` payload decoding never panics and never yields an empty
//!   room id

#![no_main]

use libfuzzer_sys::fuzz_target;
use tandem_proto::{Frame, FrameKind, JoinRoom};

fuzz_target!(|text: &str| {
    let Ok(frame) = Frame::parse(text) else {
        return;
    };

    assert_eq!(&**frame.raw(), text, "relay text must be the input verbatim");

    if let Some(payload) = frame.payload() {
        assert!(payload.is_object(), "non-object payload accepted");
    }

    if frame.kind() == FrameKind::JoinRoom {
        if let Ok(join) = frame.payload_as::<JoinRoom>() {
            assert!(!join.room_id.as_str().is_empty(), "empty room id accepted");
        }
    }
});
