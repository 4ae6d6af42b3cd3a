//! Handler registry for dispatching push events by category.
//!
//! The registry maps each [`EventCategory`] to at most one handler, plus an
//! optional `on_start` handler run after every successful handshake. It is
//! built before the session starts and read-only afterwards.
//!
//! # Example
//!
//! ```
//! use roomwire_client::api::{ChatEvent, EventCategory};
//! use roomwire_client::handler::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register(EventCategory::Chat, |event: ChatEvent, ctx| async move {
//!     if event.message == "!ping" {
//!         ctx.client().chat("pong").await
//!     } else {
//!         Ok(())
//!     }
//! });
//!
//! assert_eq!(registry.subscriptions(), vec!["chat"]);
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::EventContext;
use crate::api::EventCategory;
use crate::codec::JsonCodec;
use crate::error::{Result, RoomwireError};

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for event handlers.
pub trait Handler: Send + Sync + 'static {
    /// Handle an event with its raw JSON payload.
    fn call(&self, payload: Value, ctx: EventContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that deserializes the payload before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, EventContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, EventContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, EventContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, payload: Value, ctx: EventContext) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match JsonCodec::from_value(payload) {
            Ok(v) => v,
            Err(e) => {
                let category = ctx.category();
                return Box::pin(async move {
                    Err(RoomwireError::Decode(format!(
                        "{} payload: {e}",
                        category.map_or("event", EventCategory::wire_type)
                    )))
                });
            }
        };

        Box::pin((self.handler)(parsed, ctx))
    }
}

/// Handler that only needs the context (used for `on_start`).
struct StartHandler<F>(F);

impl<F, Fut> Handler for StartHandler<F>
where
    F: Fn(EventContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, _payload: Value, ctx: EventContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.0)(ctx))
    }
}

/// Registry mapping event categories to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<EventCategory, Box<dyn Handler>>,
    on_start: Option<Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler, replacing any previous one for `category`.
    pub fn register<F, T, Fut>(&mut self, category: EventCategory, handler: F)
    where
        F: Fn(T, EventContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(category, TypedHandler::new(handler));
    }

    /// Register any [`Handler`] implementation.
    pub fn register_handler(&mut self, category: EventCategory, handler: impl Handler) {
        if self.handlers.insert(category, Box::new(handler)).is_some() {
            tracing::debug!(%category, "replacing event handler");
        }
    }

    /// Set the handler run after each successful handshake.
    pub fn set_on_start<F, Fut>(&mut self, handler: F)
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on_start = Some(Box::new(StartHandler(handler)));
    }

    /// Get the handler for a category.
    pub fn get(&self, category: EventCategory) -> Option<&dyn Handler> {
        self.handlers.get(&category).map(|h| h.as_ref())
    }

    pub fn on_start(&self) -> Option<&dyn Handler> {
        self.on_start.as_deref()
    }

    /// Whether a handler is registered for `category`.
    pub fn contains(&self, category: EventCategory) -> bool {
        self.handlers.contains_key(&category)
    }

    /// Number of categories with a handler.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Wire names of the event streams the registered handlers need.
    pub fn subscriptions(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for category in self.handlers.keys() {
            let name = category.subscription_name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("categories", &self.handlers.keys().collect::<Vec<_>>())
            .field("on_start", &self.on_start.is_some())
            .finish()
    }
}
