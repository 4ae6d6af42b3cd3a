//! Session builder and lifecycle loop.
//!
//! The [`SessionBuilder`] collects configuration and event handlers. Calling
//! [`SessionBuilder::start`] spawns the lifecycle task, which:
//! 1. Waits out the reconnect backoff and the connect throttle
//! 2. Runs one connection through the supervisor until it ends
//! 3. Starts over, until shutdown or the attempt budget is spent
//!
//! # Example
//!
//! ```no_run
//! use roomwire_client::api::ChatEvent;
//! use roomwire_client::Session;
//!
//! #[tokio::main]
//! async fn main() -> roomwire_client::Result<()> {
//!     let session = Session::builder("room-id", "api-token")
//!         .on_start(|ctx| async move { ctx.client().chat("hello").await })
//!         .on_chat(|event: ChatEvent, ctx| async move {
//!             if event.message == "!ping" {
//!                 ctx.client().chat("pong").await
//!             } else {
//!                 Ok(())
//!             }
//!         })
//!         .start()?;
//!
//!     session.wait().await
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::{
    ChannelEvent, ChatEvent, EmoteEvent, EventCategory, MessageEvent, ReactionEvent,
    TipReactionEvent, UserJoinedEvent, UserLeftEvent, UserMovedEvent, VoiceEvent,
};
use crate::config::SessionConfig;
use crate::dispatcher::RoomClient;
use crate::error::{Result, RoomwireError};
use crate::handler::{EventContext, Handler, HandlerRegistry, HandlerResult};
use crate::reconnect::{ReconnectPolicy, Throttle};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::supervisor::{shutdown_requested, ConnectionEnd, ConnectionState, Supervisor};
use crate::transport::{Connector, WebSocketConnector};

macro_rules! typed_handler {
    ($(#[$doc:meta])* $name:ident, $category:ident, $event:ty) => {
        $(#[$doc])*
        pub fn $name<F, Fut>(mut self, handler: F) -> Self
        where
            F: Fn($event, EventContext) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = HandlerResult> + Send + 'static,
        {
            self.registry.register(EventCategory::$category, handler);
            self
        }
    };
}

/// Builder for configuring and starting a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    registry: HandlerRegistry,
    connector: Option<Arc<dyn Connector>>,
}

impl SessionBuilder {
    /// Start from the defaults for `room_id` with `api_token`.
    pub fn new(room_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self::with_config(SessionConfig::new(room_id, api_token))
    }

    /// Start from an existing configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            registry: HandlerRegistry::new(),
            connector: None,
        }
    }

    /// Override the endpoint URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the keepalive interval and how long a keepalive may go unanswered.
    ///
    /// Default: 15 seconds, 5 seconds grace
    pub fn heartbeat(mut self, interval: Duration, grace: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self.config.heartbeat_grace_period = grace;
        self
    }

    /// Set the timeout for requests that do not pass their own.
    ///
    /// Default: 10 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_default = timeout;
        self
    }

    /// Set the longest silence tolerated on the socket.
    ///
    /// Default: 20 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the delays between reconnect attempts. The last entry repeats.
    ///
    /// Default: 1, 2, 5, 10 seconds
    pub fn reconnect_backoff(mut self, schedule: Vec<Duration>) -> Self {
        self.config.reconnect_backoff_schedule = schedule;
        self
    }

    /// Give up after `attempts` consecutive failed connects. 0 never gives up.
    ///
    /// Default: 0
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer_channel_capacity = capacity;
        self
    }

    /// Set the maximum number of concurrent event handlers.
    ///
    /// When this limit is reached, new events are dropped with a warning.
    /// Default: 256
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.config.max_concurrent_handlers = limit;
        self
    }

    /// Allow `burst` connects back to back, then one per `recharge`.
    ///
    /// Default: 5 per 5 seconds
    pub fn connect_throttle(mut self, burst: u32, recharge: Duration) -> Self {
        self.config.throttle_burst = burst;
        self.config.throttle_recharge = recharge;
        self
    }

    /// Use a custom transport instead of WebSocket.
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Run `handler` after every successful handshake, including reconnects.
    pub fn on_start<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.set_on_start(handler);
        self
    }

    /// Register a typed handler for any category.
    pub fn on<F, T, Fut>(mut self, category: EventCategory, handler: F) -> Self
    where
        F: Fn(T, EventContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(category, handler);
        self
    }

    /// Register a [`Handler`] implementation for a category.
    pub fn handler(mut self, category: EventCategory, handler: impl Handler) -> Self {
        self.registry.register_handler(category, handler);
        self
    }

    typed_handler!(
        /// Room chat from other users.
        on_chat, Chat, ChatEvent
    );
    typed_handler!(
        /// Whispers addressed to the bot.
        on_whisper, Whisper, ChatEvent
    );
    typed_handler!(on_emote, Emote, EmoteEvent);
    typed_handler!(on_reaction, Reaction, ReactionEvent);
    typed_handler!(on_user_join, UserJoined, UserJoinedEvent);
    typed_handler!(on_user_leave, UserLeft, UserLeftEvent);
    typed_handler!(
        /// Tips sent between any two users in the room.
        on_tip, Tip, TipReactionEvent
    );
    typed_handler!(
        /// Hidden messages from other bots.
        on_channel, Channel, ChannelEvent
    );
    typed_handler!(on_user_move, UserMoved, UserMovedEvent);
    typed_handler!(on_voice_change, VoiceChange, VoiceEvent);
    typed_handler!(
        /// Direct messages in the bot's conversations.
        on_message, Message, MessageEvent
    );

    /// Validate the configuration and spawn the session.
    ///
    /// Must be called from within a Tokio runtime. Returns as soon as the
    /// lifecycle task is running; use [`Session::wait_live`] to wait for the
    /// first handshake.
    pub fn start(self) -> Result<Session> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let stats = Arc::new(SessionStats::new());
        let client = RoomClient::new(config.request_timeout_default, stats.clone());
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let policy = config.reconnect_policy();
        let throttle = config.throttle();
        let supervisor = Supervisor::new(
            config,
            connector,
            Arc::new(self.registry),
            client.clone(),
            Arc::new(state_tx),
        );

        let task = tokio::spawn(run_lifecycle(supervisor, policy, throttle, shutdown_rx));

        Ok(Session {
            client,
            stats,
            state: state_rx,
            shutdown_tx,
            task,
        })
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("room_id", &self.config.room_id)
            .field("url", &self.config.url)
            .field("registry", &self.registry)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

/// A running bot session.
///
/// Dropping the handle shuts the session down, same as [`Session::stop`]
/// without waiting for it.
#[derive(Debug)]
pub struct Session {
    client: RoomClient,
    stats: Arc<SessionStats>,
    state: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl Session {
    /// Create a session builder.
    pub fn builder(room_id: impl Into<String>, api_token: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(room_id, api_token)
    }

    /// Handle for sending requests. Stays valid across reconnects.
    pub fn client(&self) -> &RoomClient {
        &self.client
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    ///
    /// A watch keeps only the latest value, so short-lived states such as
    /// `Connecting` may be skipped. After a lost connection the state stays
    /// [`ConnectionState::Failed`] through the backoff, until the next
    /// attempt moves it to `Connecting`.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait until a connection is live.
    ///
    /// Fails with [`RoomwireError::SessionClosed`] if the session ends first.
    pub async fn wait_live(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == ConnectionState::Live)
            .await
            .map(|_| ())
            .map_err(|_| RoomwireError::SessionClosed)
    }

    /// Drain the live connection, fail pending requests and stop.
    ///
    /// Returns the error that ended the session if it had already stopped on
    /// its own, such as [`RoomwireError::ReconnectExhausted`].
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        join(self.task).await
    }

    /// Run until the session ends on its own.
    ///
    /// This consumes the session and only returns once reconnecting gives up.
    pub async fn wait(self) -> Result<()> {
        let Session {
            shutdown_tx, task, ..
        } = self;
        let result = join(task).await;
        drop(shutdown_tx);
        result
    }
}

async fn join(task: JoinHandle<Result<()>>) -> Result<()> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(RoomwireError::ConnectionLost(format!(
            "session task failed: {e}"
        ))),
    }
}

/// Reconnect loop around the supervisor.
///
/// `failures` counts consecutive attempts that never reached `Live`; losing a
/// live connection resets it.
async fn run_lifecycle(
    mut supervisor: Supervisor,
    policy: ReconnectPolicy,
    mut throttle: Throttle,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut failures: u32 = 0;
    let mut backoff = Duration::ZERO;

    loop {
        if !backoff.is_zero() && !sleep_or_shutdown(backoff, &mut shutdown).await {
            break;
        }

        let wait = throttle.acquire(Instant::now());
        if !wait.is_zero() {
            tracing::debug!(?wait, "connect throttled");
            if !sleep_or_shutdown(wait, &mut shutdown).await {
                break;
            }
        }

        match supervisor.run_connection(&mut shutdown).await {
            ConnectionEnd::Stopped => break,
            ConnectionEnd::Lost { error, was_live } => {
                failures = if was_live { 0 } else { failures + 1 };

                if policy.is_exhausted(failures) {
                    tracing::error!(
                        attempts = failures,
                        reason = %error,
                        "reconnect attempts exhausted"
                    );
                    supervisor.set_state(ConnectionState::Disconnected);
                    return Err(RoomwireError::ReconnectExhausted {
                        attempts: failures,
                        last_error: error.to_string(),
                    });
                }

                backoff = policy.delay(failures);
                tracing::warn!(
                    attempt = failures + 1,
                    delay = ?backoff,
                    reason = %error,
                    "reconnecting"
                );
            }
        }
    }

    supervisor.set_state(ConnectionState::Disconnected);
    tracing::info!("session stopped");
    Ok(())
}

/// Sleep for `duration`. Returns `false` if shutdown was requested first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown_requested(shutdown) => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
