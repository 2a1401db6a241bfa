//! Tandem signaling relay server.
//!
//! Brokers one peer-to-peer call per room: tracks which connections belong
//! to which room, caps rooms at two members, and relays negotiation and chat
//! frames between the members without interpreting them.
//!
//! ## Architecture
//!
//! ```text
//! tandem-server
//!   ├─ WsTransport        (TCP listener + WebSocket upgrade)
//!   ├─ ChannelExecutor    (per-session outbound queues)
//!   ├─ ServerDriver       (Sans-IO message router)
//!   │    ├─ ConnectionRegistry  (session state)
//!   │    └─ RoomDirectory       (membership, capacity, broadcast)
//!   └─ SystemEnv          (production Environment impl)
//! ```
//!
//! The driver and executor sit behind one mutex. Every transport event is
//! processed, and its actions queued, while holding it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod driver_error;
pub mod env;
mod error;
mod executor;
mod registry;
mod room_directory;
mod system_env;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use config::{DEFAULT_PORT, RuntimeMode, ServerRuntimeConfig};
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use driver_error::{DriverError, ExecutorError};
pub use env::Environment;
pub use error::ServerError;
pub use executor::{
    ActionExecutor, ChannelExecutor, DeliveryReport, OUTBOUND_QUEUE_CAPACITY, execute_actions,
};
use futures::{SinkExt, StreamExt};
pub use registry::{ConnectionRegistry, SessionId, SessionInfo};
pub use room_directory::{JoinResult, MAX_ROOM_SIZE, RoomAction, RoomDirectory, RoomError};
pub use system_env::SystemEnv;
use tandem_proto::OutboundFrame;
use tokio::{net::TcpStream, sync::{Mutex, mpsc}};
use tokio_tungstenite::tungstenite::Message;
pub use transport::{WsConnection, WsTransport};

/// Driver plus the queues its actions write to.
struct Relay {
    driver: ServerDriver<SystemEnv>,
    executor: ChannelExecutor,
}

type SharedRelay = Arc<Mutex<Relay>>;

/// Production Tandem server.
///
/// Wraps `ServerDriver` with the WebSocket transport and system environment.
pub struct Server {
    relay: SharedRelay,
    transport: WsTransport,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or binding to the
    /// address fails.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let driver = ServerDriver::new(SystemEnv::new(), config.driver);
        let transport = WsTransport::bind(config.bind_address).await?;
        let relay = Relay { driver, executor: ChannelExecutor::new() };

        Ok(Self { relay: Arc::new(Mutex::new(relay)), transport })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server forever, accepting connections and relaying frames.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` completes.
    ///
    /// Stops accepting new connections once `shutdown` resolves. Accept
    /// failures are logged and never end the loop.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                },
                accepted = self.transport.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let relay = Arc::clone(&self.relay);

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, relay).await {
                                tracing::debug!("Connection error from {}: {}", peer, e);
                            }
                        });
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
            }
        }

        Ok(())
    }
}

/// Handle a single WebSocket connection from handshake to close.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    relay: SharedRelay,
) -> Result<(), ServerError> {
    let ws = transport::upgrade(stream).await?;
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_QUEUE_CAPACITY);

    let session_id = {
        let mut relay = relay.lock().await;
        match relay.driver.accept_connection() {
            Ok(session_id) => {
                relay.executor.attach(session_id, tx);
                session_id
            },
            Err(e) => {
                drop(relay);
                tracing::warn!("Rejecting connection from {}: {}", peer, e);
                let _ = sink.close().await;
                return Ok(());
            },
        }
    };

    tracing::debug!("New connection {} from {}", session_id, peer);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::text(frame.to_string())).await {
                tracing::debug!("Write error on session {}: {}", session_id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reason = loop {
        let event = match source.next().await {
            Some(Ok(Message::Text(text))) => {
                ServerEvent::FrameReceived { session_id, text: text.as_str().to_owned() }
            },
            Some(Ok(Message::Binary(_))) => ServerEvent::BinaryReceived { session_id },
            Some(Ok(Message::Close(_))) => break "closed by peer".to_string(),
            Some(Ok(_)) => continue,
            Some(Err(e)) => break format!("read error: {e}"),
            None => break "stream ended".to_string(),
        };

        dispatch(&relay, event).await;
    };

    {
        let mut relay = relay.lock().await;
        let Relay { driver, executor } = &mut *relay;
        match driver.process_event(ServerEvent::ConnectionClosed { session_id, reason }) {
            Ok(actions) => {
                execute_actions(executor, actions);
            },
            Err(e) => tracing::error!("Close processing error: {}", e),
        }
        executor.detach(session_id);
    }

    // Detaching dropped the last sender, so the writer drains and exits.
    drop(writer);

    Ok(())
}

/// Process one event and queue its actions under the relay lock.
async fn dispatch(relay: &SharedRelay, event: ServerEvent) {
    let mut relay = relay.lock().await;
    let Relay { driver, executor } = &mut *relay;

    match driver.process_event(event) {
        Ok(actions) => {
            execute_actions(executor, actions);
        },
        Err(e) if e.is_client_error() => tracing::warn!("Dropping frame: {}", e),
        Err(e) => tracing::error!("Frame processing error: {}", e),
    }
}
