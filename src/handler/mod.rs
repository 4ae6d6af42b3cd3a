//! Handler module - event handlers and their dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps event categories to handlers
//! - [`EventContext`] - what a handler knows about its event, and the
//!   [`RoomClient`](crate::RoomClient) to answer with
//!
//! The router that feeds handlers from the read loop is internal.

mod context;
mod registry;
mod router;

pub use context::EventContext;
pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult, TypedHandler};
pub(crate) use router::EventRouter;
