//! Errors produced by the library.

use std::time::Duration;

use reqwest::StatusCode;

/// Shortened alias for results returned by this library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every error which can be returned from a [`ClientHub`][crate::hub::ClientHub] and the
/// clients it owns.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure while talking to the Discord api.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure on the gateway websocket.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// A payload could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configured url could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A header value (usually the token) contains characters which are not allowed.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Discord rejected the token.
    #[error("unauthorized, the token is most likely invalid")]
    Unauthorized,

    /// Discord answered with an error status.
    #[error("Discord API error {status}: {message} (code {code})")]
    Api {
        status: StatusCode,
        code: u64,
        message: String,
    },

    /// A request was rate limited more often than the configured retry budget allows.
    #[error("max retries exceeded (retries: {retries}, total wait time: {total_wait:?})")]
    MaxRetriesExceeded { retries: u32, total_wait: Duration },

    /// The gateway closed the connection with a code which can not be recovered from.
    #[error("gateway closed the connection with code {0}")]
    GatewayClosed(u16),

    /// The gateway did not send HELLO in time.
    #[error("timed out waiting for HELLO from the gateway")]
    HelloTimeout,

    /// The gateway sent something the client can not make sense of.
    #[error("gateway protocol error: {0}")]
    Protocol(String),

    /// The gateway connection was lost too many times in a row.
    #[error("gave up reconnecting after {0} attempts")]
    MaxReconnectAttempts(u32),

    /// `connect` was called on a gateway client which is already running.
    #[error("gateway client is already started")]
    AlreadyStarted,

    /// A command was sent while no gateway connection is open.
    #[error("gateway client is not connected")]
    NotConnected,

    /// A client group with this name is already registered in the hub.
    #[error("client group {0} already exists")]
    DuplicateGroup(String),

    /// An event name which does not map onto any known event type.
    #[error("unknown event type {0}")]
    UnknownEvent(String),

    /// A handler asked for an argument which was never added to the dispatcher.
    #[error("no argument named {0} was added to the dispatcher")]
    MissingArgument(String),

    /// A handler asked for an argument with a different type than the one stored.
    #[error("argument {name} is not of type {expected}")]
    ArgumentType {
        name: String,
        expected: &'static str,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl Error {
    /// Whether the gateway client should try to connect again after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::GatewayClosed(_)
                | Self::Unauthorized
                | Self::InvalidHeader(_)
                | Self::Url(_)
                | Self::MaxReconnectAttempts(_)
                | Self::AlreadyStarted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_details() {
        let err = Error::GatewayClosed(4004);
        assert!(err.to_string().contains("4004"));

        let err = Error::DuplicateGroup("default".into());
        assert_eq!(err.to_string(), "client group default already exists");

        let err = Error::Api {
            status: StatusCode::NOT_FOUND,
            code: 10003,
            message: "Unknown Channel".into(),
        };
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("Unknown Channel"));
        assert!(text.contains("10003"));
    }

    #[test]
    fn fatal_errors_are_not_recoverable() {
        assert!(!Error::GatewayClosed(4014).is_recoverable());
        assert!(!Error::Unauthorized.is_recoverable());
        assert!(Error::HelloTimeout.is_recoverable());
        assert!(Error::Protocol("bad".into()).is_recoverable());
    }
}
