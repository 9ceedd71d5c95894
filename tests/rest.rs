use std::time::Duration;

use hubcord::config::RestConfig;
use hubcord::models::{CreateMessageRequest, InteractionResponse, Snowflake};
use hubcord::{Error, RestClient};
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rest_config(server: &MockServer) -> RestConfig {
    let mut config = RestConfig {
        api_url: server.uri(),
        ..RestConfig::default()
    };
    config.rate_limit.min_wait_ms = 0;
    config.rate_limit.max_wait_ms = 1_000;
    config
}

fn message_json() -> serde_json::Value {
    json!({
        "id": "10",
        "channel_id": "1",
        "author": { "id": "2", "username": "bot", "bot": true },
        "content": "pong",
        "timestamp": "2024-01-01T00:00:00.000000+00:00"
    })
}

#[tokio::test]
async fn create_message_is_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v10/channels/1/messages"))
        .and(header("authorization", "Bot secret"))
        .and(body_json(json!({ "content": "pong" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = RestClient::new("secret", &rest_config(&server)).unwrap();
    let message = client
        .create_message(Snowflake(1), &CreateMessageRequest::content("pong"))
        .await
        .unwrap();

    assert_eq!(message.id, Snowflake(10));
    assert_eq!(message.content, "pong");
    assert!(message.author.bot);
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/users/@me"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "message": "You are being rate limited.",
            "retry_after": 0.0,
            "global": false
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/users/@me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "2", "username": "bot", "bot": true })),
        )
        .with_priority(2)
        .mount(&server)
        .await;

    let client = RestClient::new("secret", &rest_config(&server)).unwrap();
    let user = client.current_user().await.unwrap();
    assert_eq!(user.username, "bot");
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/users/@me"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "retry_after": 0.0, "global": false })),
        )
        .expect(3)
        .mount(&server)
        .await;

    let mut config = rest_config(&server);
    config.rate_limit.max_retries = 2;
    let client = RestClient::new("secret", &config).unwrap();

    match client.current_user().await {
        Err(Error::MaxRetriesExceeded { retries, total_wait }) => {
            assert_eq!(retries, 2);
            assert_eq!(total_wait, Duration::from_millis(200));
        }
        other => panic!("expected MaxRetriesExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_is_returned_when_retries_are_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/users/@me"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "message": "slow down", "retry_after": 5.0 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = rest_config(&server);
    config.rate_limit.max_retries = 0;
    let client = RestClient::new("secret", &config).unwrap();

    match client.current_user().await {
        Err(Error::Api { status, message, .. }) => {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(message, "slow down");
        }
        other => panic!("expected a rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_statuses_are_mapped() {
    let server = MockServer::start().await;
    Mock::given(path("/v10/users/@me"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "401: Unauthorized", "code": 0 })),
        )
        .mount(&server)
        .await;
    Mock::given(path("/v10/channels/404/messages"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "message": "Unknown Channel", "code": 10003 })),
        )
        .mount(&server)
        .await;

    let client = RestClient::new("secret", &rest_config(&server)).unwrap();

    assert!(matches!(client.current_user().await, Err(Error::Unauthorized)));

    match client
        .create_message(Snowflake(404), &CreateMessageRequest::content("hello"))
        .await
    {
        Err(Error::Api { status, code, message }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(code, 10003);
            assert_eq!(message, "Unknown Channel");
        }
        other => panic!("expected an api error, got {other:?}"),
    }
}

#[tokio::test]
async fn reactions_and_interactions_hit_their_routes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v10/channels/1/messages/2/reactions/party%3A9/@me"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v10/interactions/5/interaction-token/callback"))
        .and(body_json(json!({ "type": 4, "data": { "content": "hi", "flags": 64 } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = RestClient::new("secret", &rest_config(&server)).unwrap();
    client
        .create_reaction(Snowflake(1), Snowflake(2), "party:9")
        .await
        .unwrap();
    client
        .create_interaction_response(
            Snowflake(5),
            "interaction-token",
            &InteractionResponse::message("hi").ephemeral(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn hub_groups_share_the_http_client_but_not_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/users/@me"))
        .and(header("authorization", "Bot first"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "1", "username": "first" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/users/@me"))
        .and(header("authorization", "Bot second"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "2", "username": "second" })),
        )
        .mount(&server)
        .await;

    let mut config = hubcord::HubConfig::default();
    config.rest = rest_config(&server);
    let hub = hubcord::ClientHub::with_config(config).unwrap();
    let first = hub.create_client_group("first", "first").unwrap();
    let second = hub.create_client_group("second", "second").unwrap();

    assert_eq!(first.client().current_user().await.unwrap().username, "first");
    assert_eq!(second.client().current_user().await.unwrap().username, "second");
}

#[tokio::test]
async fn gateway_bot_information() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/gateway/bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "wss://gateway.discord.gg",
            "shards": 1,
            "session_start_limit": {
                "total": 1000,
                "remaining": 999,
                "reset_after": 14400000,
                "max_concurrency": 1
            }
        })))
        .mount(&server)
        .await;

    let client = RestClient::new("secret", &rest_config(&server)).unwrap();
    let gateway = client.get_gateway_bot().await.unwrap();
    assert_eq!(gateway.url, "wss://gateway.discord.gg");
    assert_eq!(gateway.session_start_limit.remaining_sessions, 999);
}
