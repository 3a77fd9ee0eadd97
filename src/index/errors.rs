//! Index cache error types

use thiserror::Error;

use crate::idset::CodecError;

use super::store::StoreError;

/// Result type for index cache operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised while maintaining an index through the buffered cache
#[derive(Debug, Error)]
pub enum IndexError {
    /// The backing store failed; the transaction cannot proceed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored value under a key is corrupt.
    ///
    /// Fatal to operations on that key only; sibling keys are unaffected.
    #[error("key {key_hex}: {source}")]
    CorruptValue {
        /// Hex rendering of the affected index key
        key_hex: String,
        #[source]
        source: CodecError,
    },
}

impl IndexError {
    pub(crate) fn corrupt_value(key: &[u8], source: CodecError) -> Self {
        IndexError::CorruptValue {
            key_hex: hex(key),
            source,
        }
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
