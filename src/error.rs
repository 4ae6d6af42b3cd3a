//! Error types for roomwire-client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error returned by the server for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Machine-readable error code. The server omits it for generic failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ServerError {
    /// Create a server error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// The error code, or `"error"` when the server sent none.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or("error")
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

/// Main error type for all roomwire operations.
#[derive(Debug, Error)]
pub enum RoomwireError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Malformed inbound frame.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The server rejected this request.
    #[error("Request failed: {0}")]
    Request(ServerError),

    /// No reply arrived within the allotted time.
    #[error("Request {rid} timed out after {after:?}")]
    Timeout {
        /// Correlation id of the request.
        rid: String,
        /// Timeout that elapsed.
        after: Duration,
    },

    /// The connection dropped while the request was outstanding.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A connection was opened but no usable session was established.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The reconnect budget is spent; the session is over.
    #[error("Reconnect attempts exhausted after {attempts} attempts: {last_error}")]
    ReconnectExhausted {
        /// Number of failed attempts.
        attempts: u32,
        /// Reason reported by the last failure.
        last_error: String,
    },

    /// A request id was registered twice.
    #[error("Duplicate request id: {0}")]
    DuplicateRequestId(String),

    /// Protocol violation (bad payload shape, unexpected frame, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The outbound queue stayed full for longer than the write timeout.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// The session was stopped.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid session configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RoomwireError {
    /// Whether this error is a per-request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RoomwireError::Timeout { .. })
    }

    /// Whether this error means the transport went away under the request.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            RoomwireError::ConnectionLost(_) | RoomwireError::SessionClosed
        )
    }

    /// Whether the session cannot recover from this error on its own.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RoomwireError::ReconnectExhausted { .. } | RoomwireError::SessionClosed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RoomwireError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RoomwireError::WebSocket(Box::new(e))
    }
}

/// Result type alias using RoomwireError.
pub type Result<T> = std::result::Result<T, RoomwireError>;
