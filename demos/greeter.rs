//! Greeter bot - welcomes users and answers a few chat commands.
//!
//! This example demonstrates:
//! - Building a session with typed event handlers
//! - Sending requests from inside a handler through its context
//! - Scheduling a delayed action with `call_in`
//!
//! # Running
//!
//! ```sh
//! ROOM_ID=... API_TOKEN=... RUST_LOG=roomwire_client=debug,greeter=info \
//!     cargo run --example greeter
//! ```

use std::time::Duration;

use roomwire_client::api::{ChatEvent, Facing, Position, UserJoinedEvent};
use roomwire_client::{EventContext, Session, SessionConfig};
use tracing_subscriber::EnvFilter;

async fn on_chat(event: ChatEvent, ctx: EventContext) -> roomwire_client::Result<()> {
    let client = ctx.client();
    match event.message.trim() {
        "!ping" => client.chat("pong").await,
        "!who" => {
            let users = client.get_room_users().await?;
            let names: Vec<_> = users.iter().map(|(user, _)| user.username.as_str()).collect();
            client
                .send_whisper(&event.user.id, format!("In the room: {}", names.join(", ")))
                .await
        }
        "!dance" => client.send_emote("dance-macarena", None).await,
        "!center" => {
            client
                .walk_to(Position::new(7.5, 0.0, 7.5).facing(Facing::FrontLeft))
                .await
        }
        _ => Ok(()),
    }
}

async fn on_join(event: UserJoinedEvent, ctx: EventContext) -> roomwire_client::Result<()> {
    let client = ctx.client().clone();
    let name = event.user.username;
    // Give the newcomer's client a moment to load the room.
    ctx.client().call_in(Duration::from_secs(2), async move {
        if let Err(error) = client.chat(format!("Welcome, {name}!")).await {
            tracing::warn!(%error, "greeting failed");
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let room_id = std::env::var("ROOM_ID")?;
    let api_token = std::env::var("API_TOKEN")?;
    let config = SessionConfig::from_env(room_id, api_token);

    let session = Session::builder(config.room_id.clone(), config.api_token.clone())
        .url(config.url)
        .on_start(|ctx| async move {
            tracing::info!(room = %ctx.session().room_info.room_name, "greeter online");
            ctx.client().set_indicator(Some("icon-wave".into())).await
        })
        .on_chat(on_chat)
        .on_user_join(on_join)
        .start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    session.stop().await?;
    Ok(())
}
