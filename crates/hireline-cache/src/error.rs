//! Cache and mutation error types.

use hireline_http::{ApiError, ErrorKind};
use thiserror::Error;

use crate::key::QueryKey;

/// A result type using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors returned by cache reads.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The load was cancelled or superseded before it could be written.
    #[error("query {0} was cancelled")]
    Cancelled(QueryKey),

    /// The loader failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CacheError {
    /// Returns `true` if the load was cancelled rather than failed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// A mutation that was rejected and rolled back.
///
/// Every cached view of the collection has already been restored when this
/// is returned.
#[derive(Debug, Error)]
#[error("{action} on {collection}/{target_id} rolled back: {source}")]
pub struct MutationError {
    /// Collection the mutation targeted.
    pub collection: String,
    /// Id of the targeted entry.
    pub target_id: String,
    /// Short description of the attempted change.
    pub action: String,
    /// The classified failure.
    #[source]
    pub source: ApiError,
}

impl MutationError {
    /// Classification of the underlying failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.source.kind
    }
}
