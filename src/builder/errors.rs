//! Bulk build error types
//!
//! I/O failures abort the current flush or merge step and leave on-disk
//! state at "previous flush completed, current one did not"; a fresh
//! `start()` wipes the leftovers. Corrupt run records are fatal to the
//! read that hit them.

use std::path::PathBuf;

use thiserror::Error;

use crate::index::StoreError;

/// Result type for bulk build operations
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised by the bulk builder, run files, and the merge phase
#[derive(Debug, Error)]
pub enum BuildError {
    /// Run-file I/O failed
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// The run file being read or written
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run record could not be decoded
    #[error("corrupt run record in {path} at offset {offset}: {reason}")]
    CorruptRun {
        /// The run file containing the bad record
        path: PathBuf,
        /// Byte offset of the record that failed to decode
        offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// An existing stored value failed to decode during the merge
    #[error("corrupt stored value: {0}")]
    CorruptStored(#[from] crate::idset::CodecError),

    /// The backing store rejected a merged value
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BuildError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &std::path::Path, offset: u64, reason: impl Into<String>) -> Self {
        BuildError::CorruptRun {
            path: path.to_path_buf(),
            offset,
            reason: reason.into(),
        }
    }
}
