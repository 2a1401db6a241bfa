//! Fuzz target for the relay driver
//!
//! # Strategy
//!
//! - Operation sequences: joins, leaves, relayed frames, malformed frames,
//!   disconnects and reconnects across a handful of clients and rooms
//! - Raw text: arbitrary strings fed straight in as frames
//!
//! # Invariants
//!
//! - No room exceeds its capacity
//! - No room is kept empty
//! - A session is in at most one room and the registry agrees
//! - NEVER panic on any input

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tandem_harness::{Operation, SimServer};
use tandem_server::{MAX_ROOM_SIZE, ServerEvent};

const CLIENTS: usize = 4;

#[derive(Debug, Arbitrary)]
enum Step {
    Op(Operation),
    RawText { client_id: u8, text: String },
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    steps: Vec<Step>,
}

fuzz_target!(|input: Input| {
    let Ok(mut server) = SimServer::new(CLIENTS, input.seed) else {
        return;
    };

    for step in input.steps {
        match step {
            Step::Op(op) => {
                let _ = server.apply(&op.clamp_client(CLIENTS));
            },
            Step::RawText { client_id, text } => {
                if let Some(session_id) = server.session(client_id % CLIENTS as u8) {
                    let _ = server.process(ServerEvent::FrameReceived { session_id, text });
                }
            },
        }

        check_invariants(&server);
    }
});

fn check_invariants(server: &SimServer) {
    let driver = server.driver();
    let mut placed = HashSet::new();

    for (room_id, size) in driver.rooms().rooms() {
        assert!(size > 0, "empty room {room_id} kept");
        assert!(size <= MAX_ROOM_SIZE, "room {room_id} over capacity");

        for member in driver.sessions_in_room(room_id.as_str()) {
            assert!(placed.insert(member), "session {member} in two rooms");
            let registered = driver.registry().get(member).and_then(|s| s.room_id.as_ref());
            assert_eq!(registered, Some(room_id), "registry disagrees with room");
        }
    }

    for session in driver.registry().sessions() {
        assert_eq!(session.room_id.is_some(), placed.contains(&session.session_id));
    }
}
