//! # roomwire-client
//!
//! Rust client runtime for bots living in a virtual room.
//!
//! A bot keeps one WebSocket open to the room service. Requests sent by any
//! number of tasks are correlated with their replies by id; unsolicited
//! events are fanned out to typed handlers. The session keeps the socket
//! alive with keepalives and reconnects with backoff when it drops.
//!
//! ## Architecture
//!
//! - **Dispatcher** ([`RoomClient`]): request ids, correlation table, timeouts
//! - **Supervisor**: one connection from handshake to teardown, single read loop
//! - **Writer task**: the only owner of the socket's write half
//! - **Event router**: push frames to handlers, on their own tasks
//! - **Lifecycle** ([`Session`]): backoff, connect throttle, attempt budget
//!
//! ## Example
//!
//! ```no_run
//! use roomwire_client::api::{ChatEvent, UserJoinedEvent};
//! use roomwire_client::Session;
//!
//! #[tokio::main]
//! async fn main() -> roomwire_client::Result<()> {
//!     let session = Session::builder("room-id", "api-token")
//!         .on_user_join(|event: UserJoinedEvent, ctx| async move {
//!             let greeting = format!("Welcome, {}!", event.user.username);
//!             ctx.client().chat(greeting).await
//!         })
//!         .on_chat(|event: ChatEvent, ctx| async move {
//!             if event.message == "!wallet" {
//!                 let wallet = ctx.client().get_wallet().await?;
//!                 ctx.client().chat(format!("{wallet:?}")).await
//!             } else {
//!                 Ok(())
//!             }
//!         })
//!         .start()?;
//!
//!     session.wait().await
//! }
//! ```

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod reconnect;
pub mod transport;

mod dispatcher;
mod pending;
mod session;
mod stats;
mod supervisor;
mod writer;

pub use config::SessionConfig;
pub use dispatcher::RoomClient;
pub use error::{Result, RoomwireError, ServerError};
pub use handler::EventContext;
pub use pending::Outcome;
pub use reconnect::ReconnectPolicy;
pub use session::{Session, SessionBuilder};
pub use stats::StatsSnapshot;
pub use supervisor::ConnectionState;
