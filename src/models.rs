//! The small set of Discord objects the library itself needs.
//!
//! These are not complete representations of the api objects, unknown fields are ignored.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Discord id. Sent as a string on the wire, stored as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Milliseconds since the Discord epoch (2015-01-01) stored in the id.
    pub fn timestamp_ms(self) -> u64 {
        (self.0 >> 22) + 1_420_070_400_000
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl<'de> Visitor<'de> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a snowflake as a string or an integer")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Snowflake, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,

    /// `"0"` for users which migrated to unique usernames.
    #[serde(default)]
    pub discriminator: Option<String>,

    #[serde(default)]
    pub global_name: Option<String>,

    #[serde(default)]
    pub avatar: Option<String>,

    /// Whether the user belongs to an OAuth2 application.
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,

    /// Empty unless the bot has the MESSAGE_CONTENT intent (or the message mentions it).
    #[serde(default)]
    pub content: String,
    pub timestamp: String,

    #[serde(default)]
    pub edited_timestamp: Option<String>,

    #[serde(default)]
    pub tts: bool,

    #[serde(default)]
    pub mention_everyone: bool,
}

/// A guild which is not (yet) available to the bot, as found in READY.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,

    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,

    #[serde(default)]
    pub owner_id: Option<Snowflake>,

    #[serde(default)]
    pub member_count: Option<u64>,

    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartialApplication {
    pub id: Snowflake,

    #[serde(default)]
    pub flags: u64,
}

/// What kind of user action created an [`Interaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum InteractionType {
    Ping,
    ApplicationCommand,
    MessageComponent,
    ApplicationCommandAutocomplete,
    ModalSubmit,
    Unknown(u8),
}

impl From<u8> for InteractionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::ApplicationCommandAutocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

impl From<InteractionType> for u8 {
    fn from(value: InteractionType) -> Self {
        match value {
            InteractionType::Ping => 1,
            InteractionType::ApplicationCommand => 2,
            InteractionType::MessageComponent => 3,
            InteractionType::ApplicationCommandAutocomplete => 4,
            InteractionType::ModalSubmit => 5,
            InteractionType::Unknown(other) => other,
        }
    }
}

/// A member of a guild, only the parts an interaction needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,

    #[serde(default)]
    pub nick: Option<String>,

    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,

    #[serde(rename = "type")]
    pub kind: InteractionType,

    /// Continuation token, needed to answer the interaction.
    pub token: String,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    pub channel_id: Option<Snowflake>,

    /// Set when the interaction was invoked in a guild.
    #[serde(default)]
    pub member: Option<Member>,

    /// Set when the interaction was invoked in a DM.
    #[serde(default)]
    pub user: Option<User>,

    /// Command or component payload, depends on [`Interaction::kind`].
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Interaction {
    /// The user who triggered the interaction, wherever it was invoked.
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
    }

    /// Name of the invoked application command, if this is one.
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref()?.get("name")?.as_str()
    }
}

/// Body of a create message request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
}

impl CreateMessageRequest {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Turns the message into a reply to `message`.
    pub fn reply_to(mut self, message: &Message) -> Self {
        self.message_reference = Some(MessageReference {
            message_id: message.id,
            channel_id: Some(message.channel_id),
            guild_id: message.guild_id,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReference {
    pub message_id: Snowflake,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

/// Answer to an [`Interaction`].
#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InteractionCallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    /// Flag which hides a response from everyone but the invoking user.
    pub const EPHEMERAL: u64 = 1 << 6;

    /// Acknowledges a PING interaction.
    pub fn pong() -> Self {
        Self { kind: 1, data: None }
    }

    /// Responds with a message.
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: 4,
            data: Some(InteractionCallbackData {
                content: Some(content.into()),
                flags: None,
            }),
        }
    }

    /// Acknowledges the interaction now, the message follows later through
    /// [`RestClient::edit_original_interaction_response`][crate::http::RestClient::edit_original_interaction_response].
    pub fn deferred() -> Self {
        Self { kind: 5, data: None }
    }

    pub fn ephemeral(mut self) -> Self {
        let data = self.data.get_or_insert_with(Default::default);
        data.flags = Some(data.flags.unwrap_or(0) | Self::EPHEMERAL);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_accepts_strings_and_numbers() {
        let from_str: Snowflake = serde_json::from_str("\"175928847299117063\"").unwrap();
        let from_num: Snowflake = serde_json::from_str("175928847299117063").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"175928847299117063\"");
        assert_eq!(from_str.timestamp_ms(), 1_462_015_105_796);
    }

    #[test]
    fn message_ignores_unknown_fields() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "id": "1",
            "channel_id": "2",
            "author": { "id": "3", "username": "someone", "bot": true },
            "content": "hi",
            "timestamp": "2024-01-01T00:00:00.000000+00:00",
            "embeds": [],
            "pinned": false
        }))
        .unwrap();

        assert!(message.author.bot);
        assert_eq!(message.guild_id, None);
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn interaction_invoker_prefers_member() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "id": "10",
            "application_id": "11",
            "type": 2,
            "token": "tok",
            "member": { "user": { "id": "12", "username": "member" }, "roles": [] },
            "data": { "name": "ping" }
        }))
        .unwrap();

        assert_eq!(interaction.kind, InteractionType::ApplicationCommand);
        assert_eq!(interaction.invoker().unwrap().username, "member");
        assert_eq!(interaction.command_name(), Some("ping"));
    }

    #[test]
    fn interaction_response_shapes() {
        let value = serde_json::to_value(InteractionResponse::message("pong").ephemeral()).unwrap();
        let expected = serde_json::json!({ "type": 4, "data": { "content": "pong", "flags": 64 } });
        assert_eq!(value, expected);

        let value = serde_json::to_value(InteractionResponse::deferred()).unwrap();
        assert_eq!(value, serde_json::json!({ "type": 5 }));
    }

    #[test]
    fn create_message_skips_empty_fields() {
        let value = serde_json::to_value(CreateMessageRequest::content("hello")).unwrap();
        assert_eq!(value, serde_json::json!({ "content": "hello" }));
    }
}
