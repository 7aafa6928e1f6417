//! Error types

use crate::types::BlockPointer;
use thiserror::Error;

/// Node cache errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The parent handle is not the node currently registered for its
    /// pointer. The caller's handle is stale and must be re-resolved from
    /// the root.
    #[error("parent node not found: {0}")]
    ParentNotFound(BlockPointer),

    /// Moving the node under itself or one of its descendants
    #[error("cannot move {pointer} under its own descendant {parent}")]
    MoveIntoDescendant {
        pointer: BlockPointer,
        parent: BlockPointer,
    },
}

/// Block retrieval errors
///
/// One fetch result is fanned out to every coalesced requester, so this is
/// `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("block not found: {0}")]
    NotFound(BlockPointer),

    #[error("failed to fetch block {pointer}: {reason}")]
    FetchFailed {
        pointer: BlockPointer,
        reason: String,
    },

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("retrieval deadline exceeded")]
    DeadlineExceeded,

    #[error("block retrieval queue is shut down")]
    Shutdown,

    #[error("retrieval was dropped before a result was delivered")]
    Dropped,
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl From<::config::ConfigError> for ApiError {
    fn from(err: ::config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
