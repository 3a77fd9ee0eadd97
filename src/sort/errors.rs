//! Ordered-result engine error types

use thiserror::Error;

/// Result type for sorting and windowing operations
pub type SortResult<T> = Result<T, SortError>;

/// Errors raised while ordering results or extracting a window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    /// The paging request is malformed and is reported back to the
    /// requester with enough detail to retry correctly.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An encoded composite sort key could not be decoded.
    #[error("corrupt sort key: {0}")]
    CorruptKey(String),

    /// The request was cancelled between record fetches.
    #[error("request cancelled")]
    Cancelled,
}
