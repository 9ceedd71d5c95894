//! Configuration for the hub and the clients it creates.
//!
//! Every struct here deserializes with defaults for missing fields, so a config
//! file only has to mention what it changes.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::intents::{Intents, DEFAULT_INTENTS};
use crate::{BASE_API_URL, DISCORD_API_VERSION, GATEWAY_URL};

/// Configuration shared by every [`ClientGroup`][crate::hub::ClientGroup] of a hub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub rest: RestConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl HubConfig {
    /// Loads the configuration from the environment (and a `.env` file when present).
    ///
    /// Recognised variables: `DISCORD_API_URL`, `DISCORD_GATEWAY_URL` and `DISCORD_INTENTS`
    /// (the raw intents bits). Everything else keeps its default.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(api_url) = env::var("DISCORD_API_URL") {
            config.rest.api_url = api_url;
        }

        if let Ok(gateway_url) = env::var("DISCORD_GATEWAY_URL") {
            config.gateway.url = gateway_url;
        }

        if let Ok(intents) = env::var("DISCORD_INTENTS") {
            config.gateway.intents = intents
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("DISCORD_INTENTS is not a number: {intents}")))?;
        }

        Ok(config)
    }
}

/// Reads a bot token from the environment variable `var` (and a `.env` file when present).
pub fn token_from_env(var: &str) -> Result<String> {
    dotenvy::dotenv().ok();

    let token = env::var(var).map_err(|_| Error::Config(format!("{var} must be set")))?;

    // Tokens copied from the developer page sometimes carry the auth scheme already.
    let token = token.trim();
    let token = token.strip_prefix("Bot ").unwrap_or(token);
    if token.is_empty() {
        return Err(Error::Config(format!("{var} is empty")));
    }

    Ok(token.to_string())
}

/// Configuration of the REST client.
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    /// Base url of the api, without the version segment.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Timeout of a single http request in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_api_url() -> String {
    BASE_API_URL.to_string()
}

fn default_api_version() -> u32 {
    DISCORD_API_VERSION
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            request_timeout_ms: default_request_timeout_ms(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl RestConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// How rate limited requests are retried.
///
/// Setting `max_retries` to 0 hands every 429 straight back to the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,

    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_min_wait_ms() -> u64 {
    500
}

fn default_max_wait_ms() -> u64 {
    60_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl RateLimitConfig {
    /// The time to wait before retrying a request which asked to be retried after
    /// `retry_after` seconds.
    pub fn wait_time(&self, retry_after: f64) -> Duration {
        let min = Duration::from_millis(self.min_wait_ms);
        let max = Duration::from_millis(self.max_wait_ms);

        // A little slack on top so the retry does not land exactly on the reset.
        let wanted = Duration::try_from_secs_f64(retry_after.max(0.0) + 0.1).unwrap_or(max);
        wanted.clamp(min, max.max(min))
    }
}

/// Configuration of the gateway client.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Url used for fresh sessions. Resumed sessions use the url handed out in READY.
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Raw bits of the [`Intents`] sent in IDENTIFY.
    #[serde(default = "default_intents")]
    pub intents: u32,

    /// Total number of members where the gateway stops sending offline members.
    #[serde(default)]
    pub large_threshold: Option<u32>,

    /// How long to wait for HELLO after the websocket opened, in milliseconds.
    #[serde(default = "default_hello_timeout_ms")]
    pub hello_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_gateway_url() -> String {
    GATEWAY_URL.to_string()
}

fn default_intents() -> u32 {
    DEFAULT_INTENTS.bits()
}

fn default_hello_timeout_ms() -> u64 {
    30_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            intents: default_intents(),
            large_threshold: None,
            hello_timeout_ms: default_hello_timeout_ms(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn intents(&self) -> Intents {
        Intents::from_bits_truncate(self.intents)
    }

    pub fn set_intents(&mut self, intents: Intents) {
        self.intents = intents.bits();
    }

    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.hello_timeout_ms)
    }
}

/// Backoff used between gateway reconnects.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,

    /// Consecutive failed attempts before `connect` gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    u32::MAX
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            max_ms: default_backoff_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: HubConfig = serde_json::from_value(serde_json::json!({
            "gateway": { "intents": 513, "reconnect": { "base_ms": 10 } },
            "rest": { "rate_limit": { "max_retries": 0 } }
        }))
        .unwrap();

        assert_eq!(config.gateway.intents(), Intents::GUILDS | Intents::GUILD_MESSAGES);
        assert_eq!(config.gateway.url, GATEWAY_URL);
        assert_eq!(config.gateway.reconnect.base_ms, 10);
        assert_eq!(config.gateway.reconnect.max_ms, 60_000);
        assert_eq!(config.rest.rate_limit.max_retries, 0);
        assert_eq!(config.rest.rate_limit.min_wait_ms, 500);
        assert_eq!(config.rest.api_version, DISCORD_API_VERSION);
    }

    #[test]
    fn empty_config_is_default() {
        let config: HubConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway.intents(), DEFAULT_INTENTS);
        assert_eq!(config.rest.api_url, BASE_API_URL);
        assert_eq!(config.gateway.hello_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rate_limit_wait_is_clamped() {
        let config = RateLimitConfig::default();
        assert_eq!(config.wait_time(0.0), Duration::from_millis(500));
        assert_eq!(config.wait_time(1.0), Duration::from_millis(1100));
        assert_eq!(config.wait_time(3600.0), Duration::from_secs(60));
        assert_eq!(config.wait_time(-5.0), Duration::from_millis(500));
    }
}
