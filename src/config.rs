//! Session configuration.

use std::time::Duration;

use crate::error::{Result, RoomwireError};
use crate::reconnect::{ReconnectPolicy, Throttle};
use crate::transport::ConnectTarget;
use crate::writer::{WriterConfig, DEFAULT_CHANNEL_CAPACITY};

/// Default bot API endpoint.
pub const DEFAULT_URL: &str = "wss://highrise.game/web/botapi";

/// Environment variable overriding [`DEFAULT_URL`].
pub const URL_ENV_VAR: &str = "HR_BOTAPI_URL";

/// Version reported in the `user-agent` header.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum concurrent event handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Everything a session needs to connect and stay connected.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint, without the `events` query.
    pub url: String,
    /// Room to join.
    pub room_id: String,
    /// Bot API token.
    pub api_token: String,
    pub user_agent: String,
    /// How often a keepalive request is sent.
    pub heartbeat_interval: Duration,
    /// How long a keepalive may go unanswered before the connection is failed.
    pub heartbeat_grace_period: Duration,
    /// Timeout for requests that do not set their own.
    pub request_timeout_default: Duration,
    /// Longest silence tolerated on the socket.
    pub read_timeout: Duration,
    pub handshake_timeout: Duration,
    pub connect_timeout: Duration,
    /// Delays between reconnect attempts; the last entry repeats.
    pub reconnect_backoff_schedule: Vec<Duration>,
    /// Consecutive failed attempts before giving up. 0 retries forever.
    pub max_reconnect_attempts: u32,
    pub writer_channel_capacity: usize,
    pub max_concurrent_handlers: usize,
    /// Connects allowed back to back.
    pub throttle_burst: u32,
    /// Time for one connect token to recharge.
    pub throttle_recharge: Duration,
}

impl SessionConfig {
    /// Defaults for `room_id` with `api_token`.
    pub fn new(room_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            room_id: room_id.into(),
            api_token: api_token.into(),
            user_agent: format!("roomwire-client/{CLIENT_VERSION}"),
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_grace_period: Duration::from_secs(5),
            request_timeout_default: Duration::from_secs(10),
            read_timeout: Duration::from_secs(20),
            handshake_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            reconnect_backoff_schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ],
            max_reconnect_attempts: 0,
            writer_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            throttle_burst: 5,
            throttle_recharge: Duration::from_secs(5),
        }
    }

    /// Like [`SessionConfig::new`], with the endpoint taken from
    /// `HR_BOTAPI_URL` when it is set.
    pub fn from_env(room_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        let mut config = Self::new(room_id, api_token);
        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            if !url.trim().is_empty() {
                tracing::debug!(%url, "endpoint overridden from environment");
                config.url = url;
            }
        }
        config
    }

    /// Reject configurations the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(RoomwireError::Config("url is empty".into()));
        }
        if self.room_id.is_empty() {
            return Err(RoomwireError::Config("room_id is empty".into()));
        }
        if self.api_token.is_empty() {
            return Err(RoomwireError::Config("api_token is empty".into()));
        }
        let non_zero = [
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_grace_period", self.heartbeat_grace_period),
            ("request_timeout_default", self.request_timeout_default),
            ("read_timeout", self.read_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("connect_timeout", self.connect_timeout),
        ];
        for (name, value) in non_zero {
            if value.is_zero() {
                return Err(RoomwireError::Config(format!("{name} must be non-zero")));
            }
        }
        // A quiet connection only hears from the server when a keepalive is
        // answered, so the read limit must outlast one keepalive round.
        let keepalive_round = self
            .heartbeat_interval
            .checked_add(self.heartbeat_grace_period);
        if keepalive_round.map_or(true, |round| self.read_timeout < round) {
            return Err(RoomwireError::Config(format!(
                "read_timeout ({:?}) must be at least heartbeat_interval plus \
                 heartbeat_grace_period ({:?} + {:?})",
                self.read_timeout, self.heartbeat_interval, self.heartbeat_grace_period
            )));
        }
        if self.max_concurrent_handlers == 0 {
            return Err(RoomwireError::Config(
                "max_concurrent_handlers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_backoff_schedule.clone(),
            self.max_reconnect_attempts,
        )
    }

    pub fn throttle(&self) -> Throttle {
        Throttle::new(self.throttle_burst, self.throttle_recharge)
    }

    pub(crate) fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            channel_capacity: self.writer_channel_capacity,
            ..WriterConfig::default()
        }
    }

    /// Connect target, subscribing to `events` (wire names) if any.
    pub fn connect_target(&self, events: &[&str]) -> ConnectTarget {
        let url = if events.is_empty() {
            self.url.clone()
        } else {
            let sep = if self.url.contains('?') { '&' } else { '?' };
            format!("{}{sep}events={}", self.url, events.join(","))
        };
        ConnectTarget {
            url,
            room_id: self.room_id.clone(),
            api_token: self.api_token.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("room", "token");
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.read_timeout, Duration::from_secs(20));
        assert_eq!(config.max_reconnect_attempts, 0);
        assert!(config.user_agent.starts_with("roomwire-client/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let err = SessionConfig::new("", "token").validate().unwrap_err();
        assert!(matches!(err, RoomwireError::Config(msg) if msg.contains("room_id")));
        assert!(SessionConfig::new("room", "").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = SessionConfig::new("room", "token");
        config.heartbeat_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_read_timeout_outlasts_keepalive() {
        let mut config = SessionConfig::new("room", "token");
        config.heartbeat_interval = Duration::from_secs(30);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RoomwireError::Config(msg) if msg.contains("read_timeout")));

        config.read_timeout = Duration::from_secs(35);
        assert!(config.validate().is_ok());

        config.heartbeat_interval = Duration::MAX;
        config.read_timeout = Duration::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_unbounded_request_timeout() {
        let mut config = SessionConfig::new("room", "token");
        config.request_timeout_default = Duration::MAX;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connect_target_subscriptions() {
        let config = SessionConfig::new("room", "token");

        let bare = config.connect_target(&[]);
        assert_eq!(bare.url, DEFAULT_URL);

        let target = config.connect_target(&["chat", "user_joined"]);
        assert_eq!(target.url, format!("{DEFAULT_URL}?events=chat,user_joined"));
        assert_eq!(target.room_id, "room");
        assert_eq!(target.api_token, "token");
    }

    #[test]
    fn test_connect_target_existing_query() {
        let mut config = SessionConfig::new("room", "token");
        config.url = "ws://localhost:9000/botapi?debug=1".into();
        let target = config.connect_target(&["chat"]);
        assert_eq!(target.url, "ws://localhost:9000/botapi?debug=1&events=chat");
    }
}
