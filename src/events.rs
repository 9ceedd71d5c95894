//! Events recieved from the gateway.
//!
//! Every dispatch the gateway sends is turned into a [`GatewayEvent`]. Each variant wraps
//! its own struct which implements [`Event`], this is what lets
//! [`EventDispatcher::add_handler`][crate::dispatcher::EventDispatcher::add_handler] work out
//! which events a handler wants from the type of its first parameter.

use std::ops::Deref;

use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    Guild, Interaction, Member, Message, PartialApplication, Snowflake, UnavailableGuild, User,
};

/// An event struct which can be recieved on its own by a handler.
pub trait Event: Clone + Send + Sync + 'static {
    /// The tag every event of this type is registered under.
    const EVENT_TYPE: EventType;

    /// Borrows the event out of a [`GatewayEvent`] when it is of this type.
    fn from_gateway(event: &GatewayEvent) -> Option<&Self>;
}

macro_rules! gateway_events {
    ($( $(#[$doc:meta])* $variant:ident($event:ident) = $name:literal, )+) => {
        /// Tag of a [`GatewayEvent`] variant, used as the key handlers are registered under.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventType {
            $( $variant, )+
            /// Every dispatch without a dedicated variant.
            Unknown,
        }

        impl EventType {
            /// Every tag with a dedicated variant.
            pub const KNOWN: &'static [EventType] = &[$( EventType::$variant, )+];

            /// The gateway name of the event, e.g. `MESSAGE_CREATE`.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                    Self::Unknown => "UNKNOWN",
                }
            }

            /// Resolves a gateway event name. `None` for names without a dedicated variant.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        /// An event dispatched by the gateway.
        #[derive(Debug, Clone)]
        pub enum GatewayEvent {
            $( $(#[$doc])* $variant($event), )+
            Unknown(UnknownEvent),
        }

        impl GatewayEvent {
            pub fn event_type(&self) -> EventType {
                match self {
                    $( Self::$variant(_) => EventType::$variant, )+
                    Self::Unknown(_) => EventType::Unknown,
                }
            }

            /// Decodes the data of a dispatch payload named `name`.
            pub fn from_dispatch(name: &str, data: Value) -> serde_json::Result<Self> {
                // Some events (RESUMED) may come without any data.
                let data = if data.is_null() { Value::Object(Default::default()) } else { data };

                match name {
                    $( $name => Ok(Self::$variant(serde_json::from_value(data)?)), )+
                    _ => Ok(Self::Unknown(UnknownEvent { name: name.to_string(), data })),
                }
            }
        }

        $(
            impl Event for $event {
                const EVENT_TYPE: EventType = EventType::$variant;

                fn from_gateway(event: &GatewayEvent) -> Option<&Self> {
                    match event {
                        GatewayEvent::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )+
    };
}

gateway_events! {
    /// The session is established, the largest event the gateway sends.
    Ready(ReadyEvent) = "READY",
    /// A previous session was resumed, missed events follow.
    Resumed(ResumedEvent) = "RESUMED",
    MessageCreate(MessageCreateEvent) = "MESSAGE_CREATE",
    MessageUpdate(MessageUpdateEvent) = "MESSAGE_UPDATE",
    MessageDelete(MessageDeleteEvent) = "MESSAGE_DELETE",
    MessageReactionAdd(MessageReactionAddEvent) = "MESSAGE_REACTION_ADD",
    MessageReactionRemove(MessageReactionRemoveEvent) = "MESSAGE_REACTION_REMOVE",
    /// A guild became available, was joined, or is sent lazily after READY.
    GuildCreate(GuildCreateEvent) = "GUILD_CREATE",
    GuildDelete(GuildDeleteEvent) = "GUILD_DELETE",
    /// A user interacted with a command or component. Has to be answered within 3 seconds.
    InteractionCreate(InteractionCreateEvent) = "INTERACTION_CREATE",
}

impl Event for UnknownEvent {
    const EVENT_TYPE: EventType = EventType::Unknown;

    fn from_gateway(event: &GatewayEvent) -> Option<&Self> {
        match event {
            GatewayEvent::Unknown(inner) => Some(inner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version.
    #[serde(rename = "v")]
    pub api_version: u8,
    pub user: User,
    pub guilds: Vec<UnavailableGuild>,

    /// Used for resuming connections.
    pub session_id: String,

    /// Gateway url to use for resuming connections.
    pub resume_gateway_url: String,

    #[serde(default)]
    pub shard: Option<[u32; 2]>,
    pub application: PartialApplication,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumedEvent {}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreateEvent {
    #[serde(flatten)]
    pub message: Message,

    /// Member of the author, only for guild messages. Its `user` is never set.
    #[serde(default)]
    pub member: Option<Member>,
}

impl Deref for MessageCreateEvent {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

/// An edited message. Only `id` and `channel_id` are guaranteed.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageUpdateEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    pub author: Option<User>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub edited_timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeleteEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// Emoji used in a reaction. Unicode emojis only have a name.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionEmoji {
    #[serde(default)]
    pub id: Option<Snowflake>,

    #[serde(default)]
    pub name: Option<String>,
}

impl ReactionEmoji {
    /// The form the REST api expects in reaction routes, `name:id` for custom emojis.
    pub fn to_route_form(&self) -> String {
        match (&self.name, self.id) {
            (Some(name), Some(id)) => format!("{name}:{id}"),
            (Some(name), None) => name.clone(),
            (None, Some(id)) => format!("_:{id}"),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageReactionAddEvent {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    pub member: Option<Member>,
    pub emoji: ReactionEmoji,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageReactionRemoveEvent {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub emoji: ReactionEmoji,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildCreateEvent {
    #[serde(flatten)]
    pub guild: Guild,

    #[serde(default)]
    pub joined_at: Option<String>,
}

impl Deref for GuildCreateEvent {
    type Target = Guild;

    fn deref(&self) -> &Guild {
        &self.guild
    }
}

/// The bot left or was removed from a guild, or the guild went unavailable.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildDeleteEvent {
    pub id: Snowflake,

    /// `false` when the bot was removed from the guild.
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionCreateEvent {
    #[serde(flatten)]
    pub interaction: Interaction,
}

impl Deref for InteractionCreateEvent {
    type Target = Interaction;

    fn deref(&self) -> &Interaction {
        &self.interaction
    }
}

/// A dispatch the library has no dedicated struct for, with its data left as json.
#[derive(Debug, Clone)]
pub struct UnknownEvent {
    pub name: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_data() -> Value {
        json!({
            "id": "100",
            "channel_id": "200",
            "guild_id": "300",
            "author": { "id": "400", "username": "someone" },
            "member": { "roles": ["500"] },
            "content": "hello",
            "timestamp": "2024-01-01T00:00:00.000000+00:00"
        })
    }

    #[test]
    fn names_round_trip_through_tags() {
        for event_type in EventType::KNOWN {
            assert_eq!(EventType::from_name(event_type.name()), Some(*event_type));
        }
        assert_eq!(EventType::from_name("TYPING_START"), None);
    }

    #[test]
    fn message_create_decodes() {
        let event = GatewayEvent::from_dispatch("MESSAGE_CREATE", message_data()).unwrap();
        assert_eq!(event.event_type(), EventType::MessageCreate);

        let message = MessageCreateEvent::from_gateway(&event).unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.channel_id, Snowflake(200));
        assert_eq!(message.member.as_ref().unwrap().roles, vec![Snowflake(500)]);
        assert!(ReadyEvent::from_gateway(&event).is_none());
    }

    #[test]
    fn unmapped_events_are_kept_raw() {
        let event = GatewayEvent::from_dispatch("TYPING_START", json!({ "user_id": "1" })).unwrap();
        let GatewayEvent::Unknown(unknown) = &event else {
            panic!("expected an unknown event");
        };
        assert_eq!(unknown.name, "TYPING_START");
        assert_eq!(unknown.data["user_id"], "1");
        assert_eq!(event.event_type(), EventType::Unknown);
    }

    #[test]
    fn resumed_accepts_null_data() {
        let event = GatewayEvent::from_dispatch("RESUMED", Value::Null).unwrap();
        assert_eq!(event.event_type(), EventType::Resumed);
    }

    #[test]
    fn malformed_known_event_is_an_error() {
        assert!(GatewayEvent::from_dispatch("MESSAGE_DELETE", json!({ "id": "1" })).is_err());
    }

    #[test]
    fn ready_decodes() {
        let event = GatewayEvent::from_dispatch(
            "READY",
            json!({
                "v": 10,
                "user": { "id": "1", "username": "bot", "bot": true },
                "guilds": [{ "id": "2", "unavailable": true }],
                "session_id": "abc",
                "resume_gateway_url": "wss://gateway-us-east1-b.discord.gg",
                "application": { "id": "3", "flags": 0 }
            }),
        )
        .unwrap();

        let GatewayEvent::Ready(ready) = event else {
            panic!("expected READY");
        };
        assert_eq!(ready.session_id, "abc");
        assert!(ready.user.bot);
        assert!(ready.guilds[0].unavailable);
    }

    #[test]
    fn reaction_emoji_route_form() {
        let unicode = ReactionEmoji { id: None, name: Some("👍".into()) };
        let custom = ReactionEmoji { id: Some(Snowflake(9)), name: Some("party".into()) };
        assert_eq!(unicode.to_route_form(), "👍");
        assert_eq!(custom.to_route_form(), "party:9");
    }
}
