//! CLI-specific error types

use thiserror::Error;

use crate::builder::BuildError;
use crate::idset::CodecError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading an input file failed
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the input file
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run-file operation failed
    #[error(transparent)]
    Build(#[from] BuildError),

    /// An identifier-set value failed to decode
    #[error(transparent)]
    Codec(#[from] CodecError),
}
