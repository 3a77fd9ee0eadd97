//! Identifier-set codec errors
//!
//! A corrupt encoding is fatal to the read that hit it, but never to
//! sibling keys: callers report the key and move on.

use thiserror::Error;

/// Result type for identifier-set decoding
pub type CodecResult<T> = Result<T, CodecError>;

/// Corruption detected while decoding a persisted identifier set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Value length is neither zero, the sentinel, nor a multiple of 8
    #[error("corrupt encoding: value length {0} is not a multiple of 8")]
    InvalidLength(usize),

    /// Single-byte value that is not the unbounded sentinel
    #[error("corrupt encoding: unknown sentinel byte {0:#04x}")]
    InvalidSentinel(u8),

    /// Identifiers are not strictly ascending
    #[error("corrupt encoding: identifiers out of order at index {0}")]
    UnsortedIds(usize),
}
