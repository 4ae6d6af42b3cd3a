//! Connection supervisor.
//!
//! Owns one connection at a time, from connect to teardown:
//!
//! ```text
//! Disconnected ─► Connecting ─► Handshaking ─► Live ─┬─► Draining ─► Disconnected
//!                     │              │               │
//!                     └──────────────┴───────────────┴─► Failed ─► (lifecycle)
//! ```
//!
//! While `Live`, a single read loop classifies every inbound frame in arrival
//! order: replies resolve the correlation table, pushes go to the event
//! router, and server faults fail the connection. Outbound traffic goes
//! through the writer task; a keepalive task probes the connection on a
//! fixed interval.
//!
//! Teardown order matters. The writer is detached first so new requests fail
//! fast, then the writer is stopped, then every pending request is failed.
//! A request whose frame was written is therefore always registered before
//! the table is drained.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::KeepaliveRequest;
use crate::config::{SessionConfig, CLIENT_VERSION};
use crate::dispatcher::RoomClient;
use crate::error::{Result, RoomwireError};
use crate::handler::{EventRouter, HandlerRegistry};
use crate::pending::Outcome;
use crate::protocol::{decode_frame, decode_handshake, Frame};
use crate::stats::SessionStats;
use crate::transport::{Connector, Transport};
use crate::writer::{spawn_writer_task, WriterHandle};

/// Longest a clean shutdown waits for queued frames to be flushed.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle state of the session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Socket open, waiting for session metadata.
    Handshaking,
    /// Requests and events flow.
    Live,
    /// Shutting down on request.
    Draining,
    /// The connection broke; a reconnect may follow.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Live => "live",
            ConnectionState::Draining => "draining",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How one connection ended.
#[derive(Debug)]
pub(crate) enum ConnectionEnd {
    /// Shutdown was requested.
    Stopped,
    /// The connection failed; `was_live` if it got past the handshake.
    Lost { error: RoomwireError, was_live: bool },
}

/// Why the live loop stopped.
enum Exit {
    Shutdown,
    Failed(RoomwireError),
    /// The writer task already finished; its handle must not be awaited again.
    WriterGone(RoomwireError),
}

pub(crate) struct Supervisor {
    config: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    registry: Arc<HandlerRegistry>,
    semaphore: Arc<Semaphore>,
    client: RoomClient,
    stats: Arc<SessionStats>,
    state: Arc<watch::Sender<ConnectionState>>,
    has_been_live: bool,
}

impl Supervisor {
    pub(crate) fn new(
        config: Arc<SessionConfig>,
        connector: Arc<dyn Connector>,
        registry: Arc<HandlerRegistry>,
        client: RoomClient,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_handlers));
        let stats = client.stats().clone();
        Self {
            config,
            connector,
            registry,
            semaphore,
            client,
            stats,
            state,
            has_been_live: false,
        }
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "connection state");
        }
    }

    /// Run one connection to completion.
    pub(crate) async fn run_connection(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectionEnd {
        self.set_state(ConnectionState::Connecting);
        let target = self.config.connect_target(&self.registry.subscriptions());
        tracing::debug!(url = %target.url, room_id = %target.room_id, "connecting");

        let connect =
            tokio::time::timeout(self.config.connect_timeout, self.connector.connect(&target));
        let transport = tokio::select! {
            _ = shutdown_requested(shutdown) => return self.stopped_early(),
            res = connect => match res {
                Ok(Ok(transport)) => transport,
                Ok(Err(e)) => return self.failed_early(e),
                Err(_) => {
                    return self.failed_early(RoomwireError::ConnectionLost(format!(
                        "connect timed out after {:?}",
                        self.config.connect_timeout
                    )))
                }
            },
        };
        let Transport { sink, mut stream } = transport;

        self.set_state(ConnectionState::Handshaking);
        let first = tokio::select! {
            _ = shutdown_requested(shutdown) => return self.stopped_early(),
            res = tokio::time::timeout(self.config.handshake_timeout, stream.next()) => res,
        };
        let metadata = match first {
            Ok(Some(Ok(text))) => {
                self.stats.record_frame_in();
                match decode_handshake(&text) {
                    Ok(metadata) => metadata,
                    Err(e) => return self.failed_early(e),
                }
            }
            Ok(Some(Err(e))) => return self.failed_early(e),
            Ok(None) => {
                return self.failed_early(RoomwireError::Handshake(
                    "connection closed before session metadata".into(),
                ))
            }
            Err(_) => {
                return self.failed_early(RoomwireError::Handshake(format!(
                    "no session metadata within {:?}",
                    self.config.handshake_timeout
                )))
            }
        };

        if let Some(recommended) = metadata.version_mismatch(CLIENT_VERSION) {
            tracing::warn!(
                ours = CLIENT_VERSION,
                recommended,
                "server recommends a different client version"
            );
        }
        tracing::info!(
            user_id = %metadata.user_id,
            room = %metadata.room_info.room_name,
            connection_id = %metadata.connection_id,
            "session established"
        );

        let (writer, mut writer_task) =
            spawn_writer_task(sink, self.config.writer_config(), self.stats.clone());
        self.client.attach(writer.clone());
        self.set_state(ConnectionState::Live);
        if std::mem::replace(&mut self.has_been_live, true) {
            self.stats.record_reconnect();
            tracing::info!("reconnected");
        }

        let router = EventRouter::new(
            self.registry.clone(),
            self.semaphore.clone(),
            metadata,
            self.client.clone(),
        );
        router.start();

        let mut keepalive = tokio::spawn(keepalive_loop(
            self.client.clone(),
            self.config.heartbeat_interval,
            self.config.heartbeat_grace_period,
        ));

        let read_timeout = self.config.read_timeout;
        let exit = loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => break Exit::Shutdown,
                res = &mut keepalive => {
                    break Exit::Failed(res.unwrap_or_else(|_| {
                        RoomwireError::ConnectionLost("keepalive task ended".into())
                    }));
                }
                res = &mut writer_task => {
                    break Exit::WriterGone(match res {
                        Ok(Ok(())) => RoomwireError::ConnectionLost("writer stopped".into()),
                        Ok(Err(e)) => e,
                        Err(_) => RoomwireError::ConnectionLost("writer task panicked".into()),
                    });
                }
                next = tokio::time::timeout(read_timeout, stream.next()) => match next {
                    Ok(Some(Ok(text))) => {
                        if let Some(fault) = self.handle_frame(&text, &router) {
                            break Exit::Failed(fault);
                        }
                    }
                    Ok(Some(Err(e))) => break Exit::Failed(e),
                    Ok(None) => {
                        break Exit::Failed(RoomwireError::ConnectionLost(
                            "socket closed by server".into(),
                        ))
                    }
                    Err(_) => {
                        break Exit::Failed(RoomwireError::ConnectionLost(format!(
                            "no frame received for {read_timeout:?}"
                        )))
                    }
                },
            }
        };

        keepalive.abort();
        self.client.detach();

        match exit {
            Exit::Shutdown => {
                self.drain(writer, writer_task).await;
                ConnectionEnd::Stopped
            }
            Exit::Failed(error) => {
                drop(writer);
                self.fail(Some(writer_task), &error).await;
                ConnectionEnd::Lost {
                    error,
                    was_live: true,
                }
            }
            Exit::WriterGone(error) => {
                drop(writer);
                self.fail(None, &error).await;
                ConnectionEnd::Lost {
                    error,
                    was_live: true,
                }
            }
        }
    }

    /// Classify one inbound frame. Returns the error if the server reported
    /// a connection-level fault.
    fn handle_frame(&self, text: &str, router: &EventRouter) -> Option<RoomwireError> {
        self.stats.record_frame_in();
        match decode_frame(text) {
            Ok(Frame::Reply { rid, outcome }) => {
                let outcome = match outcome {
                    Ok(value) => Outcome::Success(value),
                    Err(error) => Outcome::Error(error),
                };
                if self.client.table().resolve(&rid, outcome) {
                    self.stats.record_reply_resolved();
                } else {
                    self.stats.record_late_reply();
                }
                None
            }
            Ok(Frame::Push { kind, payload }) => {
                router.route(&kind, payload);
                None
            }
            Ok(Frame::Fault(error)) => {
                tracing::error!(%error, "server reported a connection error");
                Some(RoomwireError::ConnectionLost(format!("server error: {error}")))
            }
            Err(e) => {
                self.stats.record_decode_error();
                tracing::warn!(reason = %e.reason, frame = %e.snippet, "dropping malformed frame");
                None
            }
        }
    }

    /// Orderly shutdown of a live connection.
    async fn drain(&self, writer: WriterHandle, mut writer_task: JoinHandle<Result<()>>) {
        self.set_state(ConnectionState::Draining);
        let failed = self.client.table().fail_all("session closed");
        tracing::info!(
            failed_requests = failed,
            queued_frames = writer.pending_count(),
            "draining connection"
        );

        let flushed = tokio::time::timeout(DRAIN_TIMEOUT, async {
            let _ = writer.close().await;
            drop(writer);
            (&mut writer_task).await
        })
        .await;
        if flushed.is_err() {
            tracing::warn!("writer did not flush in time, aborting");
            writer_task.abort();
        }

        // Requests that raced the first drain.
        self.client.table().fail_all("session closed");
        self.set_state(ConnectionState::Disconnected);
    }

    async fn fail(&self, writer_task: Option<JoinHandle<Result<()>>>, error: &RoomwireError) {
        self.set_state(ConnectionState::Failed);
        if let Some(task) = writer_task {
            task.abort();
            let _ = task.await;
        }
        let reason = match error {
            RoomwireError::ConnectionLost(reason) => reason.clone(),
            other => other.to_string(),
        };
        let failed = self.client.table().fail_all(&reason);
        tracing::warn!(%error, failed_requests = failed, "connection failed");
    }

    fn stopped_early(&self) -> ConnectionEnd {
        self.set_state(ConnectionState::Disconnected);
        ConnectionEnd::Stopped
    }

    fn failed_early(&self, error: RoomwireError) -> ConnectionEnd {
        self.set_state(ConnectionState::Failed);
        tracing::warn!(%error, "could not establish session");
        ConnectionEnd::Lost {
            error,
            was_live: false,
        }
    }
}

/// Resolves once shutdown is requested or the session handle is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Probe the connection every `interval`; give up when a probe goes
/// unanswered for `grace`. Also sweeps expired pending entries.
async fn keepalive_loop(client: RoomClient, interval: Duration, grace: Duration) -> RoomwireError {
    let Some(first) = Instant::now().checked_add(interval) else {
        tracing::warn!(?interval, "heartbeat interval out of range, keepalive disabled");
        return std::future::pending().await;
    };
    let mut ticker = tokio::time::interval_at(first, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let swept = client.table().sweep_expired(Instant::now());
        if swept > 0 {
            tracing::debug!(swept, "expired pending requests");
        }

        match client.request_with_timeout(&KeepaliveRequest, grace).await {
            Ok(_) => tracing::trace!("keepalive acknowledged"),
            // The server answered, so the connection is alive.
            Err(RoomwireError::Request(error)) => {
                tracing::debug!(%error, "keepalive rejected");
            }
            Err(e) if e.is_timeout() => {
                return RoomwireError::ConnectionLost(format!(
                    "keepalive not answered within {grace:?}"
                ));
            }
            Err(e) => return e,
        }
    }
}
