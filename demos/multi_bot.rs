//! Example running two bots from one hub. The first answers `!ping`, the second reports how
//! often that happened on `!count`. Both read the same counter from their argument pool.
//!
//! Needs `PING_TOKEN` & `COUNT_TOKEN`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hubcord::events::{InteractionCreateEvent, MessageCreateEvent};
use hubcord::gateway_structs::{Activity, PresenceUpdate};
use hubcord::models::{CreateMessageRequest, InteractionResponse};
use hubcord::{
    token_from_env, ClientHub, ConnectionState, Context, GroupOptions, HubConfig, Intents,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

type PingCounter = Arc<AtomicU64>;

async fn on_ping(message: MessageCreateEvent, ctx: Context) -> anyhow::Result<()> {
    if message.author.bot || message.content != "!ping" {
        return Ok(());
    }

    let pings = ctx.argument::<PingCounter>("pings")?.fetch_add(1, Ordering::Relaxed) + 1;

    // The other bot is reachable through the hub.
    let counter_online = ctx
        .client_groups()?
        .get("counter")
        .is_some_and(|counter| counter.state() == ConnectionState::Connected);

    let content = if counter_online {
        "pong".to_string()
    } else {
        format!("pong ({pings} so far, the counter is offline)")
    };
    let reply = CreateMessageRequest::content(content).reply_to(&message);
    ctx.client()?.create_message(message.channel_id, &reply).await?;
    Ok(())
}

async fn on_count(message: MessageCreateEvent, ctx: Context) -> anyhow::Result<()> {
    if message.author.bot || message.content != "!count" {
        return Ok(());
    }

    let pings = ctx.argument::<PingCounter>("pings")?.load(Ordering::Relaxed);
    let reply = CreateMessageRequest::content(format!("{pings} pings so far"));
    ctx.client()?.create_message(message.channel_id, &reply).await?;
    Ok(())
}

async fn on_interaction(interaction: InteractionCreateEvent, ctx: Context) -> anyhow::Result<()> {
    let Some(command) = interaction.command_name() else {
        return Ok(());
    };
    let group = ctx.gateway()?.name();
    info!(command, group, "Recieved command");

    let response =
        InteractionResponse::message(format!("{command} handled by {group}")).ephemeral();
    ctx.client()?
        .create_interaction_response(interaction.id, &interaction.token, &response)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hubcord=info,multi_bot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let ping_token = token_from_env("PING_TOKEN")?;
    let count_token = token_from_env("COUNT_TOKEN")?;

    let hub = ClientHub::with_config(HubConfig::from_env()?)?;
    let pings = PingCounter::default();

    let ping = hub.create_client_group("ping", &ping_token)?;
    ping.dispatcher().add_argument("pings", pings.clone());
    ping.dispatcher().add_handler(on_ping);
    ping.dispatcher().add_handler(on_interaction);

    let intents = Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT;
    let options = GroupOptions::default().intents(intents);
    let counter = hub.create_client_group_with("counter", &count_token, options)?;
    counter.dispatcher().add_argument("pings", pings);
    counter.dispatcher().add_handler(on_count);
    counter
        .gateway()
        .update_presence(PresenceUpdate {
            activities: vec![Activity::custom("Counting pings")],
            ..Default::default()
        })
        .await?;

    hub.start().await
}
