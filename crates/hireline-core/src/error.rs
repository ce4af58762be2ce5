//! Common error types for hireline.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared across crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier was empty or contained whitespace.
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    /// A role tag was empty or not upper-case ASCII.
    #[error("invalid role tag: {0:?}")]
    InvalidRole(String),

    /// An identity document could not be decoded.
    #[error("invalid identity document: {0}")]
    InvalidIdentity(#[from] serde_json::Error),
}
