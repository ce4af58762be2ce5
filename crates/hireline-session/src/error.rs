//! Session error types.

use hireline_http::ApiError;
use thiserror::Error;

/// A result type using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while managing the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing the persisted identity failed.
    #[error("identity persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// The persisted identity could not be decoded.
    #[error("persisted identity is corrupt: {0}")]
    CorruptIdentity(#[from] serde_json::Error),

    /// A collaborator call failed.
    #[error("request failed: {0}")]
    Api(#[from] ApiError),

    /// The session could not be recovered and has been cleared.
    #[error("session expired")]
    SessionExpired,
}

impl SessionError {
    /// Returns `true` if the user has to sign in again.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        match self {
            Self::SessionExpired => true,
            Self::Api(err) => err.is_unauthorized(),
            Self::Persistence(_) | Self::CorruptIdentity(_) => false,
        }
    }
}
