//! End-to-end relay tests over real WebSocket connections.

use std::{net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tandem_server::{DriverConfig, MAX_ROOM_SIZE, Server, ServerRuntimeConfig};
use tokio::{net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(max_connections: usize) -> (SocketAddr, oneshot::Sender<()>) {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        driver: DriverConfig { max_connections },
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        server
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, stop_tx)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send(client: &mut Client, text: &str) {
    client.send(Message::text(text.to_string())).await.unwrap();
}

async fn recv_text(client: &mut Client) -> String {
    loop {
        let message = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return text.as_str().to_owned();
        }
    }
}

async fn recv_json(client: &mut Client) -> Value {
    serde_json::from_str(&recv_text(client).await).unwrap()
}

async fn join(client: &mut Client, room: &str, username: &str) {
    let frame = json!({"type": "join-room", "payload": {"roomId": room, "username": username}});
    send(client, &frame.to_string()).await;
}

fn count(n: usize) -> Value {
    json!({"type": "room-user-count", "payload": {"count": n}})
}

fn joined(room: &str) -> Value {
    json!({"type": "room-joined", "payload": {"roomId": room}})
}

fn user_joined(username: &str) -> Value {
    json!({"type": "user-joined", "payload": {"username": username}})
}

fn user_left(username: &str) -> Value {
    json!({"type": "user-left", "payload": {"username": username}})
}

/// Assert nothing arrives within a short window.
async fn assert_silent(client: &mut Client) {
    let result = timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

#[tokio::test]
async fn two_peers_join_and_exchange_frames() {
    let (addr, _stop) = start_server(100).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    join(&mut a, "r1", "A").await;
    assert_eq!(recv_json(&mut a).await, joined("r1"));
    assert_eq!(recv_json(&mut a).await, count(1));

    join(&mut b, "r1", "B").await;
    assert_eq!(recv_json(&mut b).await, joined("r1"));
    assert_eq!(recv_json(&mut b).await, count(2));
    assert_eq!(recv_json(&mut a).await, user_joined("B"));
    assert_eq!(recv_json(&mut a).await, count(2));

    let offer = r#"{"type":"offer","payload":{"offer":{"type":"offer","sdp":"v=0"}}}"#;
    send(&mut a, offer).await;
    assert_eq!(recv_text(&mut b).await, offer);
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn third_peer_is_turned_away() {
    let (addr, _stop) = start_server(100).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;

    join(&mut a, "r1", "A").await;
    recv_json(&mut a).await;
    recv_json(&mut a).await;
    join(&mut b, "r1", "B").await;
    recv_json(&mut b).await;
    recv_json(&mut b).await;
    recv_json(&mut a).await;
    recv_json(&mut a).await;

    join(&mut c, "r1", "C").await;
    assert_eq!(
        recv_json(&mut c).await,
        json!({"type": "room-full", "payload": {"roomId": "r1", "maxSize": 2}})
    );
    assert_silent(&mut a).await;

    // Rejected peer keeps its connection and can use another room
    join(&mut c, "r2", "C").await;
    assert_eq!(recv_json(&mut c).await, joined("r2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overfill_a_room() {
    const CONTENDERS: usize = 8;

    let (addr, _stop) = start_server(100).await;

    let tasks: Vec<_> = (0..CONTENDERS)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = connect(addr).await;
                join(&mut client, "r1", &format!("user-{i}")).await;
                let first = recv_json(&mut client).await;
                // Keep the connection open until every contender has an answer
                (first, client)
            })
        })
        .collect();

    let mut answers = Vec::with_capacity(CONTENDERS);
    let mut clients = Vec::with_capacity(CONTENDERS);
    for task in tasks {
        let (first, client) = task.await.unwrap();
        answers.push(first);
        clients.push(client);
    }

    let joined = answers.iter().filter(|frame| frame["type"] == "room-joined").count();
    let full = answers
        .iter()
        .filter(|frame| {
            **frame == json!({"type": "room-full", "payload": {"roomId": "r1", "maxSize": 2}})
        })
        .count();

    assert_eq!(joined, MAX_ROOM_SIZE);
    assert_eq!(full, CONTENDERS - MAX_ROOM_SIZE);
}

#[tokio::test]
async fn disconnect_notifies_remaining_peer() {
    let (addr, _stop) = start_server(100).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    join(&mut a, "r1", "A").await;
    recv_json(&mut a).await;
    recv_json(&mut a).await;
    join(&mut b, "r1", "B").await;
    recv_json(&mut b).await;
    recv_json(&mut b).await;
    recv_json(&mut a).await;
    recv_json(&mut a).await;

    b.close(None).await.unwrap();
    drop(b);

    assert_eq!(recv_json(&mut a).await, user_left("B"));
    assert_eq!(recv_json(&mut a).await, count(1));
}

#[tokio::test]
async fn malformed_frames_keep_the_connection_open() {
    let (addr, _stop) = start_server(100).await;
    let mut a = connect(addr).await;

    send(&mut a, "definitely not json").await;
    a.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    assert_silent(&mut a).await;

    join(&mut a, "r1", "A").await;
    assert_eq!(recv_json(&mut a).await, joined("r1"));
}

#[tokio::test]
async fn connections_over_the_limit_are_closed() {
    let (addr, _stop) = start_server(1).await;
    let mut a = connect(addr).await;
    join(&mut a, "r1", "A").await;
    recv_json(&mut a).await;

    let mut b = connect(addr).await;
    let next = timeout(RECV_TIMEOUT, b.next()).await.expect("timed out waiting for close");
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}
