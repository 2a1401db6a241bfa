//! Server error types.

/// Errors that can occur in the server runtime.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level error
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// WebSocket handshake or framing error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_transport_errors() {
        let err: ServerError = std::io::Error::other("boom").into();
        assert!(matches!(err, ServerError::Transport(_)));
        assert_eq!(err.to_string(), "transport error: boom");
    }
}
