//! Example showing a single bot which repeats every message it can read.
//!
//! Needs `DISCORD_TOKEN` (e.g. in a `.env` file) & the message content intent enabled for the bot.

use hubcord::events::{MessageCreateEvent, ReadyEvent};
use hubcord::models::CreateMessageRequest;
use hubcord::{token_from_env, ClientHub, Context, HubConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn on_ready(ready: ReadyEvent, _ctx: Context) -> anyhow::Result<()> {
    info!("Logged in as {}", ready.user.username);
    Ok(())
}

async fn on_message(message: MessageCreateEvent, ctx: Context) -> anyhow::Result<()> {
    // Bots answering bots end up in loops.
    if message.author.bot || message.content.is_empty() {
        return Ok(());
    }

    let reply = CreateMessageRequest::content(message.content.clone()).reply_to(&message);
    ctx.client()?.create_message(message.channel_id, &reply).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hubcord=info,echo=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = HubConfig::from_env()?;
    let token = token_from_env("DISCORD_TOKEN")?;

    ClientHub::connect_with_config(config, &token, |group| async move {
        group.dispatcher().add_handler(on_ready);
        group.dispatcher().add_handler(on_message);
        Ok(())
    })
    .await
}
