//! Error types for the planerix client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, API, storage and input validation errors.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// The unified error type for planerix operations.
///
/// Callers usually only need [`Error::status`] to map a failure onto a
/// user-visible message, and [`Error::is_session_expired`] to decide whether
/// to send the user back through login.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors: no HTTP response was received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (expired session, failed refresh).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-success HTTP responses, passed through unchanged.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Input validation errors (base URL, header, path).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Access token storage errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON encoding of a request body or decoding of a response body failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status carried by this error, if a response was received.
    ///
    /// Session expiry reports the status of the rejected request (401).
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::Auth(AuthError::SessionExpired(err)) => Some(err.status),
            _ => None,
        }
    }

    /// Whether the caller must re-authenticate.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Auth(AuthError::SessionExpired(_)))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request was rejected with 401 and could not be recovered by a
    /// token refresh. The stored access token has been cleared.
    #[error("session expired ({0})")]
    SessionExpired(ApiError),

    /// The refresh endpoint did not produce a new access token.
    #[error("token refresh failed")]
    RefreshFailed,

    /// Login returned no usable access token.
    #[error("login response did not contain an access token")]
    MissingAccessToken,
}

/// A non-success HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Human-readable message from the server, if any.
    pub message: Option<String>,
    /// Raw `detail` payload (validation errors and the like).
    pub detail: Option<serde_json::Value>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Error body shapes returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self {
            status,
            message,
            detail: None,
        }
    }

    /// Build an error from a response status and its raw body.
    ///
    /// Understands `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}`,
    /// `{"message": "..."}` and `{"error": "..."}`; any other non-empty body
    /// becomes the message verbatim.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
            let from_detail = parsed.detail.as_ref().and_then(detail_message);
            let message = from_detail.or(parsed.message).or(parsed.error);
            return Self {
                status,
                message,
                detail: parsed.detail,
            };
        }

        let text = String::from_utf8_lossy(body).trim().to_string();
        Self::new(status, (!text.is_empty()).then_some(text))
    }

    /// Whether the server rejected the credentials (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

fn detail_message(detail: &serde_json::Value) -> Option<String> {
    match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(str::to_string),
        _ => None,
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid request path.
    #[error("invalid path '{value}': {reason}")]
    Path { value: String, reason: String },

    /// Invalid header name or value.
    #[error("invalid header '{name}': {reason}")]
    Header { name: String, reason: String },
}

/// Token storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not a valid session file.
    #[error("corrupt session file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_detail() {
        let err = ApiError::from_body(404, br#"{"detail":"Project not found"}"#);
        assert_eq!(err.status, 404);
        assert_eq!(err.message.as_deref(), Some("Project not found"));
        assert_eq!(err.to_string(), "HTTP 404: Project not found");
    }

    #[test]
    fn parses_validation_detail() {
        let body = br#"{"detail":[{"loc":["body","email"],"msg":"field required","type":"value_error.missing"}]}"#;
        let err = ApiError::from_body(422, body);
        assert_eq!(err.message.as_deref(), Some("field required"));
        assert!(err.detail.as_ref().is_some_and(|d| d.is_array()));
    }

    #[test]
    fn falls_back_to_message_field() {
        let err = ApiError::from_body(409, br#"{"message":"Already exists"}"#);
        assert_eq!(err.message.as_deref(), Some("Already exists"));
    }

    #[test]
    fn plain_text_body_becomes_message() {
        let err = ApiError::from_body(502, b"Bad Gateway\n");
        assert_eq!(err.message.as_deref(), Some("Bad Gateway"));
        assert!(err.detail.is_none());
    }

    #[test]
    fn empty_body_has_no_message() {
        let err = ApiError::from_body(503, b"");
        assert!(err.message.is_none());
        assert_eq!(err.to_string(), "HTTP 503");
    }

    #[test]
    fn status_reaches_through_session_expiry() {
        let err = Error::from(AuthError::SessionExpired(ApiError::new(401, None)));
        assert_eq!(err.status(), Some(401));
        assert!(err.is_session_expired());

        let err = Error::from(TransportError::Timeout);
        assert_eq!(err.status(), None);
        assert!(!err.is_session_expired());
    }
}
