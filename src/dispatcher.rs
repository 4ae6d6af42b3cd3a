//! Request dispatcher.
//!
//! [`RoomClient`] is the handle every caller uses to talk to the room: event
//! handlers, `on_start`, user code holding a clone. Any number of tasks may
//! call [`RoomClient::send`] at once; each one gets a fresh request id, a
//! pending entry in the correlation table and exactly the outcome for its own
//! id.
//!
//! ```text
//! send(kind, payload)
//!   ├─ next_id() ───────────────► rid
//!   ├─ encode_request() ────────► {"_type": kind, "rid": rid, ...}
//!   ├─ table.register(rid) ─────► waiter
//!   ├─ writer.send_text() ──────► writer task ─► socket
//!   └─ timeout_at(deadline, waiter.wait())
//! ```
//!
//! The whole call shares one deadline, so time spent waiting for queue space
//! counts against the request's timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::Request;
use crate::codec::JsonCodec;
use crate::error::{Result, RoomwireError};
use crate::pending::CorrelationTable;
use crate::protocol::{encode_request, RequestIdGenerator};
use crate::stats::SessionStats;
use crate::writer::WriterHandle;

/// State shared by every clone of a [`RoomClient`].
#[derive(Debug)]
struct ClientInner {
    table: Arc<CorrelationTable>,
    ids: RequestIdGenerator,
    /// Writer of the live connection; `None` while disconnected.
    writer: RwLock<Option<WriterHandle>>,
    default_timeout: Duration,
    stats: Arc<SessionStats>,
}

/// Handle for sending requests to the room. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RoomClient {
    inner: Arc<ClientInner>,
}

impl RoomClient {
    pub(crate) fn new(default_timeout: Duration, stats: Arc<SessionStats>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                table: Arc::new(CorrelationTable::new()),
                ids: RequestIdGenerator::new(),
                writer: RwLock::new(None),
                default_timeout,
                stats,
            }),
        }
    }

    /// Route requests to a freshly established connection.
    pub(crate) fn attach(&self, writer: WriterHandle) {
        *self.inner.writer.write() = Some(writer);
    }

    /// Stop accepting requests; returns the writer that was attached.
    pub(crate) fn detach(&self) -> Option<WriterHandle> {
        self.inner.writer.write().take()
    }

    pub(crate) fn table(&self) -> &Arc<CorrelationTable> {
        &self.inner.table
    }

    /// Whether a live connection is attached.
    pub fn is_connected(&self) -> bool {
        self.inner.writer.read().is_some()
    }

    /// Requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.table.len()
    }

    /// Timeout applied when a call does not pass its own.
    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    /// Send a raw request and wait for its correlated reply.
    ///
    /// `payload` must be a JSON object (or `null` for no fields). Fails fast
    /// with [`RoomwireError::ConnectionLost`] when no connection is live.
    /// A [`RoomwireError::Timeout`] only means no reply arrived in time; the
    /// server may still have executed the command.
    pub async fn send(
        &self,
        kind: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let timeout = timeout.unwrap_or(self.inner.default_timeout);
        // No deadline when `timeout` runs past the clock's range.
        let deadline = Instant::now().checked_add(timeout);

        let writer = self
            .inner
            .writer
            .read()
            .clone()
            .ok_or_else(|| RoomwireError::ConnectionLost("not connected".to_string()))?;

        let rid = self.inner.ids.next_id();
        let text = encode_request(kind, &rid, JsonCodec::to_object(&payload)?)?;

        // Registered before the write so a fast reply always finds its entry.
        let mut waiter = self.inner.table.register(rid.clone(), timeout)?;
        tracing::trace!(%rid, kind, "sending request");

        let timed_out = || RoomwireError::Timeout {
            rid: rid.to_string(),
            after: timeout,
        };

        match until(deadline, writer.send_text(text)).await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(e),
            None => return Err(timed_out()),
        }

        match until(deadline, waiter.wait()).await {
            Some(outcome) => outcome.into_result(&rid, timeout),
            None => {
                self.inner.table.remove(&rid);
                tracing::debug!(%rid, kind, ?timeout, "request timed out");
                Err(timed_out())
            }
        }
    }

    /// Send a typed request with the default timeout.
    pub async fn request<R: Request>(&self, request: &R) -> Result<R::Response> {
        self.request_with_timeout(request, self.inner.default_timeout)
            .await
    }

    /// Send a typed request with an explicit timeout.
    pub async fn request_with_timeout<R: Request>(
        &self,
        request: &R,
        timeout: Duration,
    ) -> Result<R::Response> {
        let payload = serde_json::to_value(request)?;
        let reply = self.send(R::KIND, payload, Some(timeout)).await?;
        JsonCodec::from_value(reply)
            .map_err(|e| RoomwireError::Decode(format!("reply to {}: {e}", R::KIND)))
    }

    /// Run `fut` after `delay` on its own task.
    pub fn call_in<F>(&self, delay: Duration, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await
        })
    }

    pub(crate) fn stats(&self) -> &Arc<SessionStats> {
        &self.inner.stats
    }
}

/// Await `fut` until `deadline`, or without limit when there is none.
/// `None` means the deadline passed first.
async fn until<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Ack, ChatRequest};
    use crate::error::ServerError;
    use crate::pending::Outcome;
    use crate::protocol::RequestId;
    use crate::transport::memory::{self, ServerConnection};
    use crate::transport::{ConnectTarget, Connector};
    use crate::writer::{spawn_writer_task, WriterConfig};
    use serde_json::json;

    async fn attached_client() -> (RoomClient, ServerConnection) {
        let (connector, mut server) = memory::pair();
        let target = ConnectTarget {
            url: "memory://room".into(),
            room_id: "room".into(),
            api_token: "token".into(),
            user_agent: "test".into(),
        };
        let transport = connector.connect(&target).await.unwrap();
        let conn = server.accept().await.unwrap();

        let stats = Arc::new(SessionStats::new());
        let client = RoomClient::new(Duration::from_secs(10), stats.clone());
        let (writer, _task) = spawn_writer_task(transport.sink, WriterConfig::default(), stats);
        client.attach(writer);
        (client, conn)
    }

    fn rid_of(frame: &Value) -> RequestId {
        RequestId::from(frame["rid"].as_str().unwrap())
    }

    #[tokio::test]
    async fn test_send_fails_fast_when_detached() {
        let client = RoomClient::new(Duration::from_secs(1), Arc::new(SessionStats::new()));
        let err = client.send("ChatRequest", json!({}), None).await.unwrap_err();
        assert!(err.is_connection_lost());
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_send_rejects_non_object_payload() {
        let (client, _conn) = attached_client().await;
        let err = client.send("ChatRequest", json!([1, 2]), None).await.unwrap_err();
        assert!(matches!(err, RoomwireError::Protocol(_)));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_send_and_resolve() {
        let (client, mut conn) = attached_client().await;

        let caller = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send("ChatRequest", json!({"message": "hi"}), None)
                    .await
            })
        };

        let frame = conn.recv_json().await.unwrap();
        assert_eq!(frame["_type"], "ChatRequest");
        assert_eq!(frame["message"], "hi");

        client
            .table()
            .resolve(&rid_of(&frame), Outcome::Success(json!({"ok": true})));
        assert_eq!(caller.await.unwrap().unwrap(), json!({"ok": true}));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_to_caller() {
        let (client, mut conn) = attached_client().await;

        let caller = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .request(&ChatRequest {
                        message: "hi".into(),
                        whisper_target_id: None,
                    })
                    .await
            })
        };

        let frame = conn.recv_json().await.unwrap();
        client.table().resolve(
            &rid_of(&frame),
            Outcome::Error(ServerError::new("muted")),
        );

        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, RoomwireError::Request(e) if e.message == "muted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let (client, mut conn) = attached_client().await;

        let started = Instant::now();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send("GetWalletRequest", Value::Null, Some(Duration::from_millis(1000)))
                    .await
            })
        };
        let frame = conn.recv_json().await.unwrap();

        let err = caller.await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1100));
        assert!(!client.table().contains(&rid_of(&frame)));

        // A late reply is discarded.
        assert!(!client.table().resolve(&rid_of(&frame), Outcome::Success(Value::Null)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_waits_for_reply() {
        let (client, mut conn) = attached_client().await;

        let caller = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send("GetWalletRequest", Value::Null, Some(Duration::MAX))
                    .await
            })
        };
        let frame = conn.recv_json().await.unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(client.table().contains(&rid_of(&frame)));
        assert_eq!(client.table().sweep_expired(Instant::now()), 0);

        client
            .table()
            .resolve(&rid_of(&frame), Outcome::Success(json!({"content": []})));
        assert_eq!(caller.await.unwrap().unwrap(), json!({"content": []}));
    }

    #[tokio::test]
    async fn test_typed_request_decodes_reply() {
        let (client, mut conn) = attached_client().await;

        let caller = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .request(&ChatRequest {
                        message: "hello".into(),
                        whisper_target_id: Some("u1".into()),
                    })
                    .await
            })
        };

        let frame = conn.recv_json().await.unwrap();
        assert_eq!(frame["whisper_target_id"], "u1");
        client
            .table()
            .resolve(&rid_of(&frame), Outcome::Success(Value::Null));
        assert_eq!(caller.await.unwrap().unwrap(), Ack);
    }

    #[tokio::test]
    async fn test_cancelled_caller_leaves_no_entry() {
        let (client, mut conn) = attached_client().await;

        let caller = {
            let client = client.clone();
            tokio::spawn(async move {
                client.send("GetWalletRequest", Value::Null, None).await
            })
        };
        let _frame = conn.recv_json().await.unwrap();
        assert_eq!(client.pending_requests(), 1);

        caller.abort();
        let _ = caller.await;
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_in() {
        let client = RoomClient::new(Duration::from_secs(1), Arc::new(SessionStats::new()));
        let started = Instant::now();
        let out = client.call_in(Duration::from_secs(3), async { 7 }).await.unwrap();
        assert_eq!(out, 7);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
