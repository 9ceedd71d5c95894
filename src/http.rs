use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::*;
use reqwest::{Client, Method, RequestBuilder, Response as HttpResponse, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{RateLimitConfig, RestConfig};
use crate::error::{Error, Result};
use crate::gateway_structs::GetGatewayBotResponse;
use crate::models::{CreateMessageRequest, InteractionResponse, Message, Snowflake, User};

/// User agent in the form Discord asks libraries to send.
const USER_AGENT_VALUE: &str = concat!("DiscordBot (hubcord, ", env!("CARGO_PKG_VERSION"), ")");

/// Builds the [`Client`] shared by every [`RestClient`] of a hub.
pub fn build_http_client(config: &RestConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout())
        .user_agent(USER_AGENT_VALUE)
        .build()?)
}

/// Client for the Discord REST api, authenticated with one bot token.
///
/// Cloning is cheap, the underlying [`Client`] is reference counted.
#[derive(Clone)]
pub struct RestClient {
    // reqwest HTTP client used for requests on the Discord api, may be shared with other bots.
    client: Client,

    // The base url to be built upon when requesting.
    base_url: Url,

    // `Bot <token>`, sent with every request.
    authorization: HeaderValue,

    rate_limit: RateLimitConfig,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// The resources this client knows how to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Retrieves information on connecting the Discord gateway and additional metadata for
    /// sharding bots.
    GetGatewayBot,
    GetCurrentUser,
    CreateMessage { channel_id: Snowflake },
    DeleteMessage { channel_id: Snowflake, message_id: Snowflake },

    /// `emoji` is either a unicode emoji or `name:id` for custom ones.
    CreateReaction { channel_id: Snowflake, message_id: Snowflake, emoji: String },
    CreateInteractionResponse { interaction_id: Snowflake, token: String },
    EditOriginalInteractionResponse { application_id: Snowflake, token: String },
}

impl Route {
    /// Retrieve the extension to the base url's path.
    pub fn path(&self) -> String {
        match self {
            Route::GetGatewayBot => "gateway/bot".to_string(),
            Route::GetCurrentUser => "users/@me".to_string(),
            Route::CreateMessage { channel_id } => format!("channels/{channel_id}/messages"),
            Route::DeleteMessage { channel_id, message_id } => {
                format!("channels/{channel_id}/messages/{message_id}")
            }
            Route::CreateReaction { channel_id, message_id, emoji } => {
                let emoji: String =
                    url::form_urlencoded::byte_serialize(emoji.as_bytes()).collect();
                format!("channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me")
            }
            Route::CreateInteractionResponse { interaction_id, token } => {
                format!("interactions/{interaction_id}/{token}/callback")
            }
            Route::EditOriginalInteractionResponse { application_id, token } => {
                format!("webhooks/{application_id}/{token}/messages/@original")
            }
        }
    }
}

#[derive(Debug, Clone)]
/// Represents a request to the Discord Api
pub struct DiscordHttpRequest {
    /// What to request from the api
    pub route: Route,

    /// The method to use for the request
    pub method: Method,

    /// A map of extra headers to add upon the default ones.
    pub headers: HeaderMap,

    /// Json body of the request.
    pub body: Option<serde_json::Value>,
}

impl DiscordHttpRequest {
    /// Constructs a new [`DiscordHttpRequest`]
    pub fn new(route: Route, method: Method) -> Self {
        Self {
            route,
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Sets the json body of the request.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Adds a header to the [`HeaderMap`] of the request.
    pub fn add_header(&mut self, header_key: &'static str, header_value: &str) -> Result<()> {
        // Convert &str value into HeaderValue
        let header_value = HeaderValue::from_str(header_value)?;

        // Append new header to existing map
        self.headers.append(header_key, header_value);

        Ok(())
    }
}

/// Body of every error response the api sends.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
}

/// Body of a 429 response.
#[derive(Debug, Default, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

impl RestClient {
    /// Creates a client with its own [`Client`].
    pub fn new(token: &str, config: &RestConfig) -> Result<Self> {
        Self::with_http_client(build_http_client(config)?, token, config)
    }

    /// Creates a client which sends its requests through an existing [`Client`].
    pub fn with_http_client(client: Client, token: &str, config: &RestConfig) -> Result<Self> {
        // Authorization is added per request, the client may be shared between bots with
        // different tokens.
        let mut authorization = HeaderValue::from_str(&format!("Bot {token}"))?;
        authorization.set_sensitive(true);

        // Create the base_url utilised for all requests once here.
        let base_url = Url::from_str(&format!(
            "{}/v{}/",
            config.api_url.trim_end_matches('/'),
            config.api_version
        ))?;

        Ok(Self {
            client,
            base_url,
            authorization,
            rate_limit: config.rate_limit.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sets up a request through [`RestClient`]
    /// The [`Method`], [Path][`Route`], headers and body are retrieved through a
    /// [`DiscordHttpRequest`]
    pub fn request(&self, request: &DiscordHttpRequest) -> Result<RequestBuilder> {
        // Constructs the full URL utilised for this request
        let url_address = self.base_url.join(&request.route.path())?;

        let mut builder = self
            .client
            .request(request.method.clone(), url_address)
            .header(AUTHORIZATION, self.authorization.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder)
    }

    /// Sends a request, waiting out rate limits, and turns error statuses into [`Error`]s.
    pub async fn execute(&self, request: DiscordHttpRequest) -> Result<HttpResponse> {
        let mut retries = 0;
        let mut total_wait = Duration::ZERO;

        loop {
            debug!(
                method = %request.method,
                route = ?request.route,
                "Sending request to the Discord api"
            );
            let response = self.request(&request)?.send().await?;

            // Get the StatusCode of the request
            let status = response.status();

            // Check for any issues which can be identified through the status code
            match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    let header_retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse::<f64>().ok());
                    let body: RateLimitBody = response.json().await.unwrap_or_default();
                    let retry_after = body.retry_after.or(header_retry_after).unwrap_or(1.0);

                    if self.rate_limit.max_retries == 0 {
                        return Err(Error::Api {
                            status,
                            code: 0,
                            message: body.message,
                        });
                    }

                    if retries >= self.rate_limit.max_retries {
                        return Err(Error::MaxRetriesExceeded { retries, total_wait });
                    }

                    let wait = self.rate_limit.wait_time(retry_after);
                    warn!(
                        route = ?request.route,
                        retry_after,
                        global = body.global,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    retries += 1;
                    total_wait += wait;
                }
                StatusCode::UNAUTHORIZED => return Err(Error::Unauthorized),
                status if status.is_client_error() || status.is_server_error() => {
                    let raw = response.bytes().await?;
                    let body =
                        serde_json::from_slice::<ErrorBody>(&raw).unwrap_or_else(|_| ErrorBody {
                            code: 0,
                            message: String::from_utf8_lossy(&raw).into_owned(),
                        });
                    return Err(Error::Api {
                        status,
                        code: body.code,
                        message: body.message,
                    });
                }
                _ => return Ok(response),
            }
        }
    }

    /// Sends a request and deserializes the json body of the response.
    pub async fn request_json<T>(&self, request: DiscordHttpRequest) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Sends a request whose response has no body worth reading.
    pub async fn request_empty(&self, request: DiscordHttpRequest) -> Result<()> {
        self.execute(request).await?;
        Ok(())
    }

    /// Information on connecting to the gateway.
    pub async fn get_gateway_bot(&self) -> Result<GetGatewayBotResponse> {
        self.request_json(DiscordHttpRequest::new(Route::GetGatewayBot, Method::GET)).await
    }

    /// The user of the bot this client is authenticated as.
    pub async fn current_user(&self) -> Result<User> {
        self.request_json(DiscordHttpRequest::new(Route::GetCurrentUser, Method::GET)).await
    }

    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        message: &CreateMessageRequest,
    ) -> Result<Message> {
        let request = DiscordHttpRequest::new(Route::CreateMessage { channel_id }, Method::POST)
            .with_json(message)?;
        self.request_json(request).await
    }

    pub async fn delete_message(&self, channel_id: Snowflake, message_id: Snowflake) -> Result<()> {
        self.request_empty(DiscordHttpRequest::new(
            Route::DeleteMessage { channel_id, message_id },
            Method::DELETE,
        ))
        .await
    }

    /// Reacts to a message as the bot.
    pub async fn create_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> Result<()> {
        self.request_empty(DiscordHttpRequest::new(
            Route::CreateReaction {
                channel_id,
                message_id,
                emoji: emoji.to_string(),
            },
            Method::PUT,
        ))
        .await
    }

    /// Answers an interaction, has to happen within 3 seconds of recieving it.
    pub async fn create_interaction_response(
        &self,
        interaction_id: Snowflake,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<()> {
        let request = DiscordHttpRequest::new(
            Route::CreateInteractionResponse {
                interaction_id,
                token: token.to_string(),
            },
            Method::POST,
        )
        .with_json(response)?;
        self.request_empty(request).await
    }

    /// Edits the message sent (or deferred) as the initial interaction response.
    pub async fn edit_original_interaction_response(
        &self,
        application_id: Snowflake,
        token: &str,
        message: &CreateMessageRequest,
    ) -> Result<Message> {
        let request = DiscordHttpRequest::new(
            Route::EditOriginalInteractionResponse {
                application_id,
                token: token.to_string(),
            },
            Method::PATCH,
        )
        .with_json(message)?;
        self.request_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_paths() {
        let channel_id = Snowflake(1);
        let message_id = Snowflake(2);

        assert_eq!(Route::GetGatewayBot.path(), "gateway/bot");
        assert_eq!(Route::CreateMessage { channel_id }.path(), "channels/1/messages");
        assert_eq!(
            Route::CreateInteractionResponse {
                interaction_id: Snowflake(5),
                token: "tok".into(),
            }
            .path(),
            "interactions/5/tok/callback"
        );
        assert_eq!(
            Route::CreateReaction { channel_id, message_id, emoji: "party:9".into() }.path(),
            "channels/1/messages/2/reactions/party%3A9/@me"
        );
    }

    #[test]
    fn unicode_emoji_is_percent_encoded() {
        let path = Route::CreateReaction {
            channel_id: Snowflake(1),
            message_id: Snowflake(2),
            emoji: "👍".into(),
        }
        .path();
        assert_eq!(path, "channels/1/messages/2/reactions/%F0%9F%91%8D/@me");
    }

    #[test]
    fn base_url_carries_version() {
        let client = RestClient::new("token", &RestConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://discord.com/api/v10/");

        let request = client
            .request(&DiscordHttpRequest::new(Route::GetCurrentUser, Method::GET))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "https://discord.com/api/v10/users/@me");
        assert_eq!(request.headers()[AUTHORIZATION], "Bot token");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        assert!(matches!(
            RestClient::new("bad\ntoken", &RestConfig::default()),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn extra_headers_are_validated() {
        let mut request = DiscordHttpRequest::new(Route::GetCurrentUser, Method::GET);
        assert!(request.add_header("X-Audit-Log-Reason", "cleanup").is_ok());
        assert!(request.add_header("X-Audit-Log-Reason", "bad\nvalue").is_err());
        assert_eq!(request.headers.len(), 1);
    }
}
