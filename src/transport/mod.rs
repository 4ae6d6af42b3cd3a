//! Transport module - the socket underneath a session.
//!
//! A [`Connector`] opens one connection per call and hands back a
//! [`Transport`]: a sink of outbound text frames and a stream of inbound ones.
//! The session never looks below that line, so the same lifecycle runs over
//! a real WebSocket ([`WebSocketConnector`]) or an in-process pair
//! ([`memory`]) in tests.

pub mod memory;
mod websocket;

use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::error::{Result, RoomwireError};
use crate::handler::BoxFuture;

pub use websocket::WebSocketConnector;

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = RoomwireError> + Send>>;

/// Inbound half of a connection. The stream ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An open connection, split into its two directions.
pub struct Transport {
    /// Write half.
    pub sink: FrameSink,
    /// Read half.
    pub stream: FrameStream,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Full endpoint URL, including the event subscription query.
    pub url: String,
    /// Room to attach to.
    pub room_id: String,
    /// Bot API token.
    pub api_token: String,
    /// Value of the `user-agent` header.
    pub user_agent: String,
}

/// Opens connections for a session.
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection to `target`.
    fn connect(&self, target: &ConnectTarget) -> BoxFuture<'static, Result<Transport>>;
}
