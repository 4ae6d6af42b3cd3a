//! In-process transport for tests and local simulations.
//!
//! [`pair`] returns a [`MemoryConnector`] for the session and a
//! [`MemoryServer`] that plays the room service. Every successful
//! `connect()` shows up on the server side as a [`ServerConnection`].
//!
//! # Example
//!
//! ```
//! use roomwire_client::transport::memory;
//! use roomwire_client::transport::{ConnectTarget, Connector};
//! use futures_util::{SinkExt, StreamExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (connector, mut server) = memory::pair();
//! let target = ConnectTarget {
//!     url: "memory://room".into(),
//!     room_id: "room".into(),
//!     api_token: "token".into(),
//!     user_agent: "test".into(),
//! };
//!
//! let mut transport = connector.connect(&target).await.unwrap();
//! let mut conn = server.accept().await.unwrap();
//!
//! transport.sink.send("ping".to_string()).await.unwrap();
//! assert_eq!(conn.recv().await.as_deref(), Some("ping"));
//!
//! conn.send("pong");
//! assert_eq!(transport.stream.next().await.unwrap().unwrap(), "pong");
//! # }
//! ```

use std::io;

use serde_json::Value;
use tokio::sync::mpsc;

use super::{ConnectTarget, Connector, FrameSink, FrameStream, Transport};
use crate::error::{Result, RoomwireError};
use crate::handler::BoxFuture;

/// Create a connected connector/server pair.
pub fn pair() -> (MemoryConnector, MemoryServer) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector { accept_tx },
        MemoryServer { accept_rx },
    )
}

/// Client side: opens in-memory connections to a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<ServerConnection>,
}

impl Connector for MemoryConnector {
    fn connect(&self, target: &ConnectTarget) -> BoxFuture<'static, Result<Transport>> {
        let accept_tx = self.accept_tx.clone();
        let target = target.clone();
        Box::pin(async move {
            let (to_server_tx, to_server_rx) = mpsc::unbounded_channel::<String>();
            let (to_client_tx, to_client_rx) = mpsc::unbounded_channel::<String>();

            let conn = ServerConnection {
                target,
                tx: Some(to_client_tx),
                rx: to_server_rx,
            };
            accept_tx.send(conn).map_err(|_| {
                RoomwireError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "memory server is gone",
                ))
            })?;

            let sink: FrameSink = Box::pin(futures_util::sink::unfold(
                to_server_tx,
                |tx, text: String| async move {
                    tx.send(text).map_err(|_| {
                        RoomwireError::ConnectionLost("memory peer closed".to_string())
                    })?;
                    Ok::<_, RoomwireError>(tx)
                },
            ));

            let stream: FrameStream = Box::pin(futures_util::stream::unfold(
                to_client_rx,
                |mut rx| async move { rx.recv().await.map(|text| (Ok(text), rx)) },
            ));

            Ok(Transport { sink, stream })
        })
    }
}

/// Server side: accepts the connections a [`MemoryConnector`] opens.
///
/// Dropping the server makes every further `connect()` fail with
/// `ConnectionRefused`.
#[derive(Debug)]
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<ServerConnection>,
}

impl MemoryServer {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<ServerConnection> {
        self.accept_rx.recv().await
    }
}

/// Server end of one in-memory connection.
#[derive(Debug)]
pub struct ServerConnection {
    target: ConnectTarget,
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ServerConnection {
    /// What the client asked to connect to.
    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// Send a text frame to the client. Returns `false` once the client is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.tx
            .as_ref()
            .map(|tx| tx.send(text.into()).is_ok())
            .unwrap_or(false)
    }

    /// Send a JSON frame to the client.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send(value.to_string())
    }

    /// Receive the next frame from the client. `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Receive the next frame from the client, parsed as JSON.
    ///
    /// Frames that are not valid JSON are returned as JSON strings.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let text = self.rx.recv().await?;
        Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// End the client's inbound stream, as if the socket closed.
    pub fn close(&mut self) {
        self.tx = None;
    }
}
