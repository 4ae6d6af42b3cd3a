//! Event router: hands push frames to their handlers.
//!
//! The read loop calls [`EventRouter::route`] for every push frame. Routing
//! never awaits: the handler runs on its own task, bounded by a semaphore
//! shared across the session. When every permit is taken the event is
//! dropped with a warning rather than stalling the read loop.
//!
//! Handler errors and panics are caught on the handler's task, logged and
//! counted; they never reach the connection.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{EventContext, HandlerRegistry, HandlerResult};
use crate::api::EventCategory;
use crate::dispatcher::RoomClient;
use crate::protocol::SessionMetadata;
use crate::stats::SessionStats;

/// Routes the push frames of one connection.
pub(crate) struct EventRouter {
    registry: Arc<HandlerRegistry>,
    semaphore: Arc<Semaphore>,
    session: Arc<SessionMetadata>,
    client: RoomClient,
    stats: Arc<SessionStats>,
}

impl EventRouter {
    pub(crate) fn new(
        registry: Arc<HandlerRegistry>,
        semaphore: Arc<Semaphore>,
        session: SessionMetadata,
        client: RoomClient,
    ) -> Self {
        let stats = client.stats().clone();
        Self {
            registry,
            semaphore,
            session: Arc::new(session),
            client,
            stats,
        }
    }

    /// Dispatch one push frame. Returns `true` if a handler was spawned.
    pub(crate) fn route(&self, kind: &str, payload: Value) -> bool {
        let Some(category) = EventCategory::classify(kind, &payload) else {
            tracing::trace!(kind, "ignoring unknown event kind");
            self.stats.record_push_dropped();
            return false;
        };

        if self.is_own_chat(category, &payload) {
            tracing::trace!(%category, "skipping own chat message");
            return false;
        }

        if !self.registry.contains(category) {
            self.stats.record_push_dropped();
            return false;
        }

        let Some(permit) = self.try_permit(category) else {
            return false;
        };

        let registry = self.registry.clone();
        let ctx = self.context(Some(category));
        self.stats.record_push_routed();
        spawn_handler(category.to_string(), permit, self.stats.clone(), async move {
            match registry.get(category) {
                Some(handler) => handler.call(payload, ctx).await,
                None => Ok(()),
            }
        });
        true
    }

    /// Run the `on_start` handler, if any.
    pub(crate) fn start(&self) -> bool {
        if self.registry.on_start().is_none() {
            return false;
        }
        let Some(permit) = self.try_permit("on_start") else {
            return false;
        };

        let registry = self.registry.clone();
        let ctx = self.context(None);
        spawn_handler("on_start".to_string(), permit, self.stats.clone(), async move {
            match registry.on_start() {
                Some(handler) => handler.call(Value::Null, ctx).await,
                None => Ok(()),
            }
        });
        true
    }

    fn is_own_chat(&self, category: EventCategory, payload: &Value) -> bool {
        matches!(category, EventCategory::Chat | EventCategory::Whisper)
            && payload
                .pointer("/user/id")
                .and_then(Value::as_str)
                .is_some_and(|id| id == self.session.user_id)
    }

    fn try_permit(&self, label: impl std::fmt::Display) -> Option<OwnedSemaphorePermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(event = %label, "handler capacity reached, dropping event");
                self.stats.record_push_dropped();
                None
            }
        }
    }

    fn context(&self, category: Option<EventCategory>) -> EventContext {
        EventContext::new(category, self.session.clone(), self.client.clone())
    }
}

fn spawn_handler<F>(
    label: String,
    permit: OwnedSemaphorePermit,
    stats: Arc<SessionStats>,
    fut: F,
) where
    F: Future<Output = HandlerResult> + Send + 'static,
{
    tokio::spawn(async move {
        // Permit is held until this task completes
        let _permit = permit;

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stats.record_handler_failure();
                tracing::error!(event = %label, error = %e, "handler failed");
            }
            Err(panic) => {
                stats.record_handler_failure();
                tracing::error!(
                    event = %label,
                    panic = panic_message(&*panic),
                    "handler panicked"
                );
            }
        }
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatEvent, UserJoinedEvent};
    use crate::error::RoomwireError;
    use crate::protocol::RoomInfo;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn metadata() -> SessionMetadata {
        SessionMetadata {
            user_id: "bot".into(),
            room_info: RoomInfo {
                owner_id: "owner".into(),
                room_name: "Lobby".into(),
            },
            rate_limits: HashMap::new(),
            connection_id: "conn-1".into(),
            sdk_version: None,
        }
    }

    fn router(registry: HandlerRegistry, permits: usize) -> EventRouter {
        let client = RoomClient::new(Duration::from_secs(1), Arc::new(SessionStats::new()));
        EventRouter::new(
            Arc::new(registry),
            Arc::new(Semaphore::new(permits)),
            metadata(),
            client,
        )
    }

    fn chat(user_id: &str, message: &str, whisper: bool) -> Value {
        json!({
            "user": {"id": user_id, "username": user_id},
            "message": message,
            "whisper": whisper
        })
    }

    #[tokio::test]
    async fn test_routes_to_matching_handler() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::Chat, move |event: ChatEvent, ctx| {
            let tx = tx.clone();
            async move {
                assert_eq!(ctx.category(), Some(EventCategory::Chat));
                assert_eq!(ctx.bot_id(), "bot");
                tx.send(event.message).ok();
                Ok(())
            }
        });
        let router = router(registry, 8);

        assert!(router.route("ChatEvent", chat("alice", "hello", false)));
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(router.stats.snapshot().pushes_routed, 1);
    }

    #[tokio::test]
    async fn test_whisper_goes_to_whisper_handler() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::Chat, |_: ChatEvent, _ctx| async { Ok(()) });
        registry.register(EventCategory::Whisper, move |event: ChatEvent, _ctx| {
            let tx = tx.clone();
            async move {
                tx.send(event.message).ok();
                Ok(())
            }
        });
        let router = router(registry, 8);

        assert!(router.route("ChatEvent", chat("alice", "psst", true)));
        assert_eq!(rx.recv().await.as_deref(), Some("psst"));
    }

    #[tokio::test]
    async fn test_unmatched_and_unknown_dropped() {
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::Chat, |_: ChatEvent, _ctx| async { Ok(()) });
        let router = router(registry, 8);

        assert!(!router.route("UserLeftEvent", json!({"user": {"id": "a", "username": "a"}})));
        assert!(!router.route("SomethingNewEvent", json!({})));
        assert_eq!(router.stats.snapshot().pushes_dropped, 2);
    }

    #[tokio::test]
    async fn test_own_chat_skipped() {
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::Chat, |_: ChatEvent, _ctx| async { Ok(()) });
        let router = router(registry, 8);

        assert!(!router.route("ChatEvent", chat("bot", "echo", false)));
        assert!(router.route("ChatEvent", chat("alice", "echo", false)));
        assert_eq!(router.stats.snapshot().pushes_routed, 1);
        assert_eq!(router.stats.snapshot().pushes_dropped, 0);
    }

    #[tokio::test]
    async fn test_handler_failure_is_contained() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::UserJoined, move |event: UserJoinedEvent, _ctx| {
            let tx = tx.clone();
            async move {
                if event.user.id == "boom" {
                    panic!("handler blew up");
                }
                if event.user.id == "err" {
                    return Err(RoomwireError::Protocol("nope".into()));
                }
                tx.send(event.user.id).ok();
                Ok(())
            }
        });
        let router = router(registry, 8);

        let joined = |id: &str| json!({"user": {"id": id, "username": id}});
        assert!(router.route("UserJoinedEvent", joined("boom")));
        assert!(router.route("UserJoinedEvent", joined("err")));
        assert!(router.route("UserJoinedEvent", joined("fine")));

        assert_eq!(rx.recv().await.as_deref(), Some("fine"));
        // Let the failing tasks finish.
        for _ in 0..10 {
            if router.stats.snapshot().handler_failures == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(router.stats.snapshot().handler_failures, 2);
    }

    #[tokio::test]
    async fn test_bad_payload_counts_as_failure() {
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::UserJoined, |_: UserJoinedEvent, _ctx| async { Ok(()) });
        let router = router(registry, 8);

        assert!(router.route("UserJoinedEvent", json!({"user": 42})));
        for _ in 0..10 {
            if router.stats.snapshot().handler_failures == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(router.stats.snapshot().handler_failures, 1);
    }

    #[tokio::test]
    async fn test_capacity_limit_drops() {
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let mut registry = HandlerRegistry::new();
        registry.register(EventCategory::Chat, move |_: ChatEvent, _ctx| {
            let mut release = release_rx.clone();
            async move {
                let _ = release.wait_for(|go| *go).await;
                Ok(())
            }
        });
        let router = router(registry, 1);

        assert!(router.route("ChatEvent", chat("a", "1", false)));
        assert!(!router.route("ChatEvent", chat("a", "2", false)));
        assert_eq!(router.stats.snapshot().pushes_dropped, 1);

        release_tx.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_on_start() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.set_on_start(move |ctx| {
            let tx = tx.clone();
            async move {
                tx.send(ctx.session().room_info.room_name.clone()).ok();
                Ok(())
            }
        });
        let router = router(registry, 8);

        assert!(router.start());
        assert_eq!(rx.recv().await.as_deref(), Some("Lobby"));
    }
}
