//! Wallet bot - reports its balance and thanks tippers.
//!
//! Shows typed request/reply calls (`get_wallet`, `tip_user`) and how a
//! handler tells its own events apart from everyone else's via `bot_id`.
//!
//! ```sh
//! ROOM_ID=... API_TOKEN=... RUST_LOG=info cargo run --example wallet
//! ```

use roomwire_client::api::{ChatEvent, CurrencyItem, GoldBar, Tip, TipReactionEvent, TipResult};
use roomwire_client::{EventContext, RoomwireError, Session};
use tracing_subscriber::EnvFilter;

fn gold(wallet: &[CurrencyItem]) -> i64 {
    wallet
        .iter()
        .filter(|c| c.kind == "gold")
        .map(|c| c.amount)
        .sum()
}

async fn on_start(ctx: EventContext) -> roomwire_client::Result<()> {
    let wallet = ctx.client().get_wallet().await?;
    tracing::info!(gold = gold(&wallet), "wallet loaded");
    Ok(())
}

async fn on_tip(event: TipReactionEvent, ctx: EventContext) -> roomwire_client::Result<()> {
    if event.receiver.id != ctx.bot_id() {
        return Ok(());
    }
    let what = match &event.item {
        Tip::Currency(c) => format!("{} {}", c.amount, c.kind),
        Tip::Item(item) => item.kind.clone(),
    };
    ctx.client()
        .chat(format!("Thanks for the {what}, {}!", event.sender.username))
        .await
}

async fn on_whisper(event: ChatEvent, ctx: EventContext) -> roomwire_client::Result<()> {
    let client = ctx.client();
    match event.message.trim() {
        "balance" => {
            let balance = gold(&client.get_wallet().await?);
            client
                .send_whisper(&event.user.id, format!("I have {balance} gold."))
                .await
        }
        "tip me" => match client.tip_user(&event.user.id, GoldBar::One).await {
            Ok(TipResult::Success) => Ok(()),
            Ok(TipResult::InsufficientFunds) => {
                client.send_whisper(&event.user.id, "I'm broke, sorry.").await
            }
            // The server refused, e.g. missing permission.
            Err(RoomwireError::Request(error)) => {
                tracing::warn!(%error, user = %event.user.username, "tip refused");
                Ok(())
            }
            Err(e) => Err(e),
        },
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let session = Session::builder(std::env::var("ROOM_ID")?, std::env::var("API_TOKEN")?)
        .max_reconnect_attempts(10)
        .on_start(on_start)
        .on_tip(on_tip)
        .on_whisper(on_whisper)
        .start()?;

    session.wait_live().await?;
    tracing::info!(stats = ?session.stats(), "live");

    // Returns only once reconnecting gives up.
    session.wait().await?;
    Ok(())
}
