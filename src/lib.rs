//! ### What is Hubcord?
//! Hubcord is a discord library for running one or many bots from a single [`ClientHub`].
//! Every bot lives in its own [`ClientGroup`] (a REST client, a gateway client & an
//! [`EventDispatcher`]), handlers recieve the event they were registered for together with a
//! [`Context`] carrying the clients of their group.
//!
//! ```no_run
//! use hubcord::{ClientHub, Context, events::MessageCreateEvent, models::CreateMessageRequest};
//!
//! # async fn run() -> anyhow::Result<()> {
//! ClientHub::connect("token", |group| async move {
//!     group.dispatcher().add_handler(|message: MessageCreateEvent, ctx: Context| async move {
//!         if !message.author.bot && message.content == "!ping" {
//!             let pong = CreateMessageRequest::content("pong");
//!             ctx.client()?.create_message(message.channel_id, &pong).await?;
//!         }
//!         Ok(())
//!     });
//!     Ok(())
//! })
//! .await
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod gateway_structs;
pub mod http;
pub mod hub;
pub mod intents;
pub mod models;

mod backoff;
mod websocket;

pub use config::{token_from_env, HubConfig};
pub use dispatcher::{Context, EventDispatcher};
pub use error::{Error, Result};
pub use events::{Event, EventType, GatewayEvent};
pub use gateway::{ConnectionState, GatewayClient, GatewayCommand};
pub use http::RestClient;
pub use hub::{ClientGroup, ClientGroups, ClientHub, GroupOptions, DEFAULT_GROUP};
pub use intents::{Intents, ALL_INTENTS, DEFAULT_INTENTS};

/// The base url of the Discord api, without the version.
pub const BASE_API_URL: &str = "https://discord.com/api";

/// The version of the Discord api (& gateway) the library talks to.
pub const DISCORD_API_VERSION: u32 = 10;

/// The url new gateway sessions are opened on.
pub const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
