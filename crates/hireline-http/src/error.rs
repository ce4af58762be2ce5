//! Gateway error taxonomy.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// A result type using `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Classification of a failed gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced a response.
    NetworkError,
    /// The request did not complete within its timeout.
    Timeout,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 409.
    Conflict,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 400.
    BadRequest,
    /// Any other failure, including an unreadable success body.
    UnknownError,
}

impl ErrorKind {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            500..=599 => Self::ServerError,
            _ => Self::UnknownError,
        }
    }

    /// Return the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ServerError => "SERVER_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified gateway failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Human-readable message, from the server when it sent one.
    pub message: String,
    /// Machine-readable code from the server's error body, if any.
    pub code: Option<String>,
}

impl ApiError {
    /// Create an error with no HTTP status.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            code: None,
        }
    }

    /// A transport-level failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    /// A request that ran out of time.
    #[must_use]
    pub fn timeout(after_ms: u128) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Request timed out after {after_ms}ms"),
        )
    }

    /// Build an error from a non-success status and its raw body.
    ///
    /// The body is inspected for `message`, `error` and `code` fields. Any
    /// decoding problem falls back to a generic message.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<ErrorBody>(body).ok();
        let (message, code) = match parsed {
            Some(body) => body.into_parts(),
            None => (None, None),
        };

        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message: message.unwrap_or_else(|| format!("Request failed with status {status}")),
            code,
        }
    }

    /// Returns `true` if the server rejected the credential.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

/// Structured error body sent by the API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorField>,
    #[serde(default)]
    code: Option<CodeField>,
}

/// `error` is either a message string or a nested `{message, code}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Nested {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<CodeField>,
    },
}

/// Some endpoints send numeric codes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeField {
    Text(String),
    Number(i64),
}

impl CodeField {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

impl ErrorBody {
    fn into_parts(self) -> (Option<String>, Option<String>) {
        let mut code = self.code.map(CodeField::into_string);
        let nested_message = match self.error {
            Some(ErrorField::Text(text)) => Some(text),
            Some(ErrorField::Nested {
                message,
                code: nested_code,
            }) => {
                if code.is_none() {
                    code = nested_code.map(CodeField::into_string);
                }
                message
            }
            None => None,
        };
        let message = self
            .message
            .or(nested_message)
            .filter(|m| !m.trim().is_empty());
        (message, code)
    }
}
