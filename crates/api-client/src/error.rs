//! Client error types.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Kind of transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The request or response did not complete in time.
    Timeout,
    /// The connection could not be established (refused, DNS, TLS).
    Connect,
    /// Any other transport failure (reset, body read error, ...).
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Connect => "connect",
            NetworkErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Error returned by [`crate::Transport`] when no HTTP response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Connect, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            NetworkErrorKind::Timeout
        } else if e.is_connect() {
            NetworkErrorKind::Connect
        } else {
            NetworkErrorKind::Other
        };
        TransportError::new(kind, e.to_string())
    }
}

/// Error type for API requests.
///
/// `Clone` so a single terminal refresh failure can be delivered to every
/// queued request.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The access token was rejected and recovery did not complete.
    #[error("Access token expired")]
    AuthorizationExpired,

    /// Refresh failed, no refresh token was available, or the replayed
    /// request was rejected again. The session has been cleared.
    #[error("Authorization failed: {reason}")]
    AuthorizationFailed { reason: String },

    /// No HTTP response was received.
    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Server { status: StatusCode, body: String },

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request body could not be encoded.
    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl ClientError {
    /// Returns true for errors that end the session.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            ClientError::AuthorizationFailed { .. } | ClientError::AuthorizationExpired
        )
    }

    /// Returns true if no HTTP response was received.
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    /// Returns true if retrying the same request later may succeed.
    ///
    /// Transient errors include:
    /// - any network error
    /// - HTTP 5xx, 408 and 429
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network { .. } => true,
            ClientError::Server { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        ClientError::Network {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts_to_network() {
        let err: ClientError = TransportError::timeout("deadline elapsed").into();
        assert!(err.is_network());
        assert!(!err.is_authorization_failure());
        match err {
            ClientError::Network { kind, message } => {
                assert_eq!(kind, NetworkErrorKind::Timeout);
                assert_eq!(message, "deadline elapsed");
            }
            other => panic!("Expected Network, got {other:?}"),
        }
    }

    #[test]
    fn test_is_transient() {
        assert!(ClientError::from(TransportError::connect("refused")).is_transient());
        assert!(ClientError::Server {
            status: StatusCode::BAD_GATEWAY,
            body: String::new()
        }
        .is_transient());
        assert!(ClientError::Server {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new()
        }
        .is_transient());
        assert!(!ClientError::Server {
            status: StatusCode::NOT_FOUND,
            body: String::new()
        }
        .is_transient());
        assert!(!ClientError::AuthorizationFailed {
            reason: "no refresh token".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_status_accessor() {
        let err = ClientError::Server {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: "{}".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert_eq!(ClientError::AuthorizationExpired.status(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = ClientError::Server {
            status: StatusCode::NOT_FOUND,
            body: "patient not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 Not Found: patient not found");

        let err = ClientError::from(TransportError::connect("connection refused"));
        assert_eq!(err.to_string(), "Network error (connect): connection refused");
    }
}
