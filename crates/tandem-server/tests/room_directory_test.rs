//! Room Directory tests

use proptest::prelude::*;
use serde_json::{Value, json};
use tandem_proto::RoomId;
use tandem_server::{
    ConnectionRegistry, JoinResult, MAX_ROOM_SIZE, RoomAction, RoomDirectory, RoomError, SessionId,
};

// Test environment using system RNG (std::time::Instant)
#[derive(Clone)]
struct TestEnv;

impl tandem_server::Environment for TestEnv {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }
}

fn room(id: &str) -> RoomId {
    RoomId::new(id).unwrap()
}

fn name(n: &str) -> Option<String> {
    Some(n.to_string())
}

/// Frames delivered to `recipient`, decoded, in order.
fn delivered_to(actions: &[RoomAction], recipient: SessionId) -> Vec<Value> {
    actions
        .iter()
        .filter_map(|action| match action {
            RoomAction::Deliver { recipient: r, frame } if *r == recipient => {
                Some(serde_json::from_str(frame).unwrap())
            },
            _ => None,
        })
        .collect()
}

struct Fixture {
    env: TestEnv,
    registry: ConnectionRegistry,
    directory: RoomDirectory,
}

impl Fixture {
    fn new() -> Self {
        Self { env: TestEnv, registry: ConnectionRegistry::new(), directory: RoomDirectory::new() }
    }

    fn connect(&mut self) -> SessionId {
        self.registry.register(&self.env)
    }

    fn join(
        &mut self,
        session: SessionId,
        room_id: &str,
        username: &str,
    ) -> (JoinResult, Vec<RoomAction>) {
        self.directory.join(&mut self.registry, session, room(room_id), name(username)).unwrap()
    }

    fn leave(&mut self, session: SessionId) -> Vec<RoomAction> {
        self.directory.leave(&mut self.registry, session).unwrap()
    }
}

#[test]
fn directory_new_has_no_rooms() {
    let directory = RoomDirectory::new();
    assert!(!directory.has_room("r1"));
    assert_eq!(directory.room_count(), 0);
}

#[test]
fn first_join_creates_room() {
    let mut fx = Fixture::new();
    let a = fx.connect();

    let (result, actions) = fx.join(a, "r1", "alice");

    assert_eq!(result, JoinResult::Joined { room_id: room("r1"), member_count: 1 });
    assert!(fx.directory.has_room("r1"));
    assert!(actions.contains(&RoomAction::RoomCreated { room_id: room("r1") }));
    assert_eq!(fx.registry.get(a).unwrap().room_id, Some(room("r1")));

    // Alone in the room: only the count comes back
    assert_eq!(
        delivered_to(&actions, a),
        vec![json!({"type": "room-user-count", "payload": {"count": 1}})]
    );
}

#[test]
fn second_join_notifies_existing_member() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();

    fx.join(a, "r1", "alice");
    let (result, actions) = fx.join(b, "r1", "bob");

    assert_eq!(result, JoinResult::Joined { room_id: room("r1"), member_count: 2 });
    assert_eq!(
        delivered_to(&actions, a),
        vec![
            json!({"type": "user-joined", "payload": {"username": "bob"}}),
            json!({"type": "room-user-count", "payload": {"count": 2}}),
        ]
    );
    assert_eq!(
        delivered_to(&actions, b),
        vec![json!({"type": "room-user-count", "payload": {"count": 2}})]
    );
}

#[test]
fn full_room_rejects_without_mutation() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();
    let c = fx.connect();

    fx.join(a, "r1", "alice");
    fx.join(b, "r1", "bob");
    let (result, actions) = fx.join(c, "r1", "carol");

    assert_eq!(result, JoinResult::RoomFull { room_id: room("r1"), max_size: MAX_ROOM_SIZE });
    assert!(actions.is_empty());
    assert_eq!(fx.directory.members("r1").collect::<Vec<_>>().len(), 2);
    assert!(!fx.directory.members("r1").any(|m| m == c));
    assert!(fx.registry.get(c).unwrap().is_idle());
}

#[test]
fn joining_another_room_leaves_the_first() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();

    fx.join(a, "r1", "alice");
    fx.join(b, "r1", "bob");
    let (result, actions) = fx.join(b, "r2", "bob");

    assert!(matches!(result, JoinResult::Joined { .. }));
    assert_eq!(fx.directory.member_count("r1"), 1);
    assert_eq!(fx.directory.member_count("r2"), 1);
    assert_eq!(fx.registry.get(b).unwrap().room_id, Some(room("r2")));
    assert_eq!(
        delivered_to(&actions, a),
        vec![
            json!({"type": "user-left", "payload": {"username": "bob"}}),
            json!({"type": "room-user-count", "payload": {"count": 1}}),
        ]
    );
}

#[test]
fn leaving_for_a_new_room_closes_an_emptied_room() {
    let mut fx = Fixture::new();
    let a = fx.connect();

    fx.join(a, "r1", "alice");
    let (_, actions) = fx.join(a, "r2", "alice");

    assert!(!fx.directory.has_room("r1"));
    assert!(actions.contains(&RoomAction::RoomClosed { room_id: room("r1") }));
}

#[test]
fn rejoining_same_room_is_idempotent() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();

    fx.join(a, "r1", "alice");
    fx.join(b, "r1", "bob");
    let (result, actions) = fx.join(b, "r1", "robert");

    assert_eq!(result, JoinResult::Joined { room_id: room("r1"), member_count: 2 });
    assert_eq!(fx.directory.member_count("r1"), 2);
    assert_eq!(fx.registry.get(b).unwrap().display_name.as_deref(), Some("robert"));
    // No duplicate user-joined, just the count
    assert_eq!(
        delivered_to(&actions, a),
        vec![json!({"type": "room-user-count", "payload": {"count": 2}})]
    );
}

#[test]
fn leave_notifies_remaining_member() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();

    fx.join(a, "r1", "alice");
    fx.join(b, "r1", "bob");
    let actions = fx.leave(b);

    assert!(fx.registry.get(b).unwrap().is_idle());
    assert_eq!(
        delivered_to(&actions, a),
        vec![
            json!({"type": "user-left", "payload": {"username": "bob"}}),
            json!({"type": "room-user-count", "payload": {"count": 1}}),
        ]
    );
    assert!(delivered_to(&actions, b).is_empty());
}

#[test]
fn last_leave_deletes_room() {
    let mut fx = Fixture::new();
    let a = fx.connect();

    fx.join(a, "r1", "alice");
    let actions = fx.leave(a);

    assert!(!fx.directory.has_room("r1"));
    assert_eq!(fx.directory.room_count(), 0);
    assert!(actions.contains(&RoomAction::RoomClosed { room_id: room("r1") }));
}

#[test]
fn leave_when_idle_is_noop() {
    let mut fx = Fixture::new();
    let a = fx.connect();

    assert!(fx.leave(a).is_empty());
    assert!(fx.directory.leave(&mut fx.registry, 12345).unwrap().is_empty());
}

#[test]
fn join_unknown_session_fails() {
    let mut fx = Fixture::new();
    let result = fx.directory.join(&mut fx.registry, 777, room("r1"), None);
    assert!(matches!(result, Err(RoomError::UnknownSession(777))));
    assert!(!fx.directory.has_room("r1"));
}

#[test]
fn broadcast_excludes_sender() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();

    fx.join(a, "r1", "alice");
    fx.join(b, "r1", "bob");

    let frame: tandem_proto::OutboundFrame = r#"{"type":"chat","payload":{"text":"hi"}}"#.into();
    let actions = fx.directory.broadcast(&room("r1"), &frame, Some(a));

    assert_eq!(actions, vec![RoomAction::Deliver { recipient: b, frame }]);
}

#[test]
fn broadcast_to_unknown_room_is_empty() {
    let directory = RoomDirectory::new();
    let frame: tandem_proto::OutboundFrame = "{}".into();
    assert!(directory.broadcast(&room("nope"), &frame, None).is_empty());
}

#[test]
fn rooms_are_case_sensitive() {
    let mut fx = Fixture::new();
    let a = fx.connect();
    let b = fx.connect();
    let c = fx.connect();

    fx.join(a, "Room", "alice");
    fx.join(b, "Room", "bob");
    let (result, _) = fx.join(c, "room", "carol");

    assert!(matches!(result, JoinResult::Joined { member_count: 1, .. }));
    assert_eq!(fx.directory.room_count(), 2);
}

#[derive(Debug, Clone)]
enum Op {
    Join { session: usize, room: u8 },
    Leave { session: usize },
}

fn op_strategy(sessions: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..sessions, 0..3u8).prop_map(|(session, room)| Op::Join { session, room }),
        1 => (0..sessions).prop_map(|session| Op::Leave { session }),
    ]
}

proptest! {
    /// Room size stays within bounds and back-references agree with member
    /// sets after every operation.
    #[test]
    fn prop_membership_invariants(ops in prop::collection::vec(op_strategy(5), 0..60)) {
        let mut fx = Fixture::new();
        let sessions: Vec<SessionId> = (0..5).map(|_| fx.connect()).collect();

        for op in ops {
            match op {
                Op::Join { session, room } => {
                    let id = sessions[session];
                    let before = fx.directory.member_count(&format!("room-{room}"));
                    let (result, _) = fx.join(id, &format!("room-{room}"), "user");
                    if let JoinResult::RoomFull { .. } = result {
                        prop_assert_eq!(before, MAX_ROOM_SIZE);
                        // Any previous room was left before the capacity check
                        prop_assert!(fx.registry.get(id).unwrap().is_idle());
                    }
                },
                Op::Leave { session } => {
                    fx.leave(sessions[session]);
                },
            }

            for (room_id, size) in fx.directory.rooms() {
                prop_assert!(
                    size > 0 && size <= MAX_ROOM_SIZE,
                    "room {} has {} members",
                    room_id,
                    size
                );
            }

            for &id in &sessions {
                let session = fx.registry.get(id).unwrap();
                match &session.room_id {
                    Some(room_id) => {
                        prop_assert!(fx.directory.members(room_id.as_str()).any(|m| m == id));
                    },
                    None => {
                        for (room_id, _) in fx.directory.rooms() {
                            prop_assert!(!fx.directory.members(room_id.as_str()).any(|m| m == id));
                        }
                    },
                }
            }
        }
    }
}
