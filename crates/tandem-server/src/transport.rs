//! WebSocket transport.
//!
//! TCP listener plus the WebSocket upgrade. The handshake runs on the
//! connection's own task so a slow client never holds up the accept loop.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;

use crate::error::ServerError;

/// An upgraded client connection.
pub type WsConnection = WebSocketStream<TcpStream>;

/// Listening socket for WebSocket clients.
#[derive(Debug)]
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind the listening socket.
    pub async fn bind(address: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener })
    }

    /// Accept the next TCP connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        Ok(self.listener.accept().await?)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Perform the server side of the WebSocket handshake.
pub async fn upgrade(stream: TcpStream) -> Result<WsConnection, ServerError> {
    Ok(tokio_tungstenite::accept_async(stream).await?)
}
