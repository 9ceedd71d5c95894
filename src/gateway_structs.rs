//! A file specifically designated to creation of structs which represent Payloads & Objects
//! being sent through the Discord Gateway & related.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;

/// Opcodes of gateway payloads.
///
/// <https://discord.com/developers/docs/topics/opcodes-and-status-codes#gateway-gateway-opcodes>
pub mod opcode {
    /// An event was dispatched. (receive)
    pub const DISPATCH: u8 = 0;
    /// Keeps the connection alive. (send & receive)
    pub const HEARTBEAT: u8 = 1;
    /// Starts a new session during the initial handshake. (send)
    pub const IDENTIFY: u8 = 2;
    /// Updates the presence of the bot. (send)
    pub const PRESENCE_UPDATE: u8 = 3;
    /// Resumes a previous session that was disconnected. (send)
    pub const RESUME: u8 = 6;
    /// The client should reconnect and resume. (receive)
    pub const RECONNECT: u8 = 7;
    /// The session has been invalidated. (receive)
    pub const INVALID_SESSION: u8 = 9;
    /// First payload after connecting, carries the heartbeat interval. (receive)
    pub const HELLO: u8 = 10;
    /// Acknowledges a heartbeat. (receive)
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes sent by the gateway.
///
/// <https://discord.com/developers/docs/topics/opcodes-and-status-codes#gateway-gateway-close-event-codes>
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const UNKNOWN_ERROR: u16 = 4000;
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const INVALID_SEQ: u16 = 4007;
    pub const SESSION_TIMED_OUT: u16 = 4009;
    pub const INVALID_SHARD: u16 = 4010;
    pub const SHARDING_REQUIRED: u16 = 4011;
    pub const INVALID_API_VERSION: u16 = 4012;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;

    /// Codes after which reconnecting can not succeed.
    pub fn is_fatal(code: u16) -> bool {
        matches!(
            code,
            AUTHENTICATION_FAILED
                | INVALID_SHARD
                | SHARDING_REQUIRED
                | INVALID_API_VERSION
                | INVALID_INTENTS
                | DISALLOWED_INTENTS
        )
    }

    /// Codes after which the old session can not be resumed.
    pub fn invalidates_session(code: u16) -> bool {
        matches!(code, INVALID_SEQ | SESSION_TIMED_OUT)
    }
}

#[derive(Deserialize, Debug, Clone)]
/// The limits imposed on new sessions which are started.
///
/// <https://discord.com/developers/docs/topics/gateway#session-start-limit-object>
pub struct SessionStartLimit {
    #[serde(rename = "total")]
    /// The total number of session starts the current bot is allowed
    pub total_sessions: u32,

    #[serde(rename = "remaining")]
    /// The remaining number of session starts the current bot is allowed
    pub remaining_sessions: u32,

    /// The number of milliseconds after which the limit for starting sessions resets
    pub reset_after: u64,

    /// The number of identify requests allowed per 5 seconds
    pub max_concurrency: u32,
}

#[derive(Deserialize, Debug, Clone)]
/// A struct which represents the response from the GetGatewayBot request
pub struct GetGatewayBotResponse {
    /// The WSS URL that can be used for connecting to the gateway
    pub url: String,

    /// The recommended number of shards to use when connecting
    pub shards: u32,

    /// Information on the current session start limit
    pub session_start_limit: SessionStartLimit,
}

#[derive(Deserialize, Debug, Serialize, Clone)]
/// The Hello payload recieved from Discords gateway whenever a new connection is opened
pub struct Hello {
    /// The interval (in milliseconds) the client should heartbeat with
    pub heartbeat_interval: u64,
}

#[derive(Serialize, Clone)]
/// Payload used to trigger the initial handshake with the gateway.
pub struct Identify {
    /// The authentication token for this bot
    pub token: Arc<str>,

    #[serde(rename = "properties")]
    /// Information about the connection sent to discord.
    pub connection_properties: IdentifyConnectionProperties,

    /// The gateway intents you wish to recieve
    pub intents: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// If a guild has more total members than the threshold the gateway stops sending offline
    /// members.
    pub large_threshold: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Presence the bot starts with.
    pub presence: Option<PresenceUpdate>,
}

#[derive(Debug, Serialize, Clone, Copy)]
/// Connection information/properties related to the Identify handshake payload.
pub struct IdentifyConnectionProperties {
    #[serde(rename = "os")]
    /// The operating system the bot uses
    pub operating_system: &'static str,

    /// Library Name
    pub browser: &'static str,

    /// Library Name
    pub device: &'static str,
}

impl Default for IdentifyConnectionProperties {
    fn default() -> Self {
        let package_name = env!("CARGO_PKG_NAME");
        Self {
            operating_system: std::env::consts::OS,
            browser: package_name,
            device: package_name,
        }
    }
}

#[derive(Serialize, Clone)]
/// Payload used to replay the events missed while disconnected.
pub struct Resume {
    pub token: Arc<str>,

    /// Id of the session to resume, as handed out in READY.
    pub session_id: String,

    /// Last sequence number recieved.
    pub seq: u64,
}

// The token never ends up in logs.
impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("connection_properties", &self.connection_properties)
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .field("presence", &self.presence)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    /// Do not disturb.
    Dnd,
    Idle,
    /// Shown as offline.
    Invisible,
    Offline,
}

#[derive(Debug, Serialize, Clone)]
pub struct Activity {
    pub name: String,

    /// 0 playing, 1 streaming, 2 listening, 3 watching, 4 custom, 5 competing.
    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Activity {
    pub fn playing(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: 0, state: None }
    }

    pub fn custom(state: impl Into<String>) -> Self {
        Self { name: "Custom Status".into(), kind: 4, state: Some(state.into()) }
    }
}

#[derive(Debug, Serialize, Clone, Default)]
/// Presence update sent to the gateway.
///
/// <https://discord.com/developers/docs/topics/gateway-events#update-presence>
pub struct PresenceUpdate {
    /// Unix time (in milliseconds) of when the client went idle, `None` if it is not idle.
    pub since: Option<u64>,
    pub activities: Vec<Activity>,
    pub status: Status,
    pub afk: bool,
}

#[derive(Deserialize, Debug, Clone, Serialize)]
/// Representation of a payload to be sent or recieved from Discords Gateway.
pub struct Payload<T> {
    #[serde(rename = "op")]
    /// The opcode of this payload that denotes the payload type
    pub opcode: u8,

    #[serde(rename = "d")]
    /// The data of this payload
    pub data: T,

    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    /// Sequence number of this payload
    /// Used for resuming sessions and heartbeats
    pub sequence_number: Option<u64>,

    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    /// The event name for this payload
    pub event_name: Option<String>,
}

/// A payload with its data left undecoded until the opcode is known.
pub type RawPayload = Payload<serde_json::Value>;

impl<T: Serialize> Payload<T> {
    /// Converts a payload into a Tungstenite Message through serde_json
    pub fn to_message(&self) -> Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

impl<T> Payload<T> {
    /// Creates a new payload with only the opcode & data fields set.
    pub fn new(opcode: u8, data: T) -> Self {
        Self {
            opcode,
            data,
            sequence_number: None,
            event_name: None,
        }
    }
}
