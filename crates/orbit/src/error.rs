//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for client setup operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while building a client from configuration.
///
/// Nothing that happens after a session is running surfaces as an error; see
/// [`TransportError`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured server base URL has an unsupported scheme.
    #[error("invalid server url '{0}': expected ws://, wss://, http:// or https://")]
    InvalidBaseUrl(String),

    /// No session id configured.
    #[error("session id must not be empty")]
    EmptySessionId,
}

/// Failures opening or running a transport.
///
/// These never reach callers of the workspace API: the session controller
/// reports them as a transient `error` connection status and reconnects.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The WebSocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The handshake did not finish in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The peer refused or dropped the connection.
    #[error("connection refused: {0}")]
    Refused(String),
}
