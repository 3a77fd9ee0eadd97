//! CLI argument definitions using clap
//!
//! Commands:
//! - dirbase dump-run <file> [--replace-mode]
//! - dirbase verify-run <file> [--replace-mode]
//! - dirbase decode-set <file>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dirbase - secondary-index engine inspection tools
#[derive(Parser, Debug)]
#[command(name = "dirbase")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every record of a run file
    DumpRun {
        /// Path to the run file
        file: PathBuf,

        /// The file was built in replace mode (has removed-id runs)
        #[arg(long)]
        replace_mode: bool,
    },

    /// Check a run file for strict key and id ordering
    VerifyRun {
        /// Path to the run file
        file: PathBuf,

        /// The file was built in replace mode (has removed-id runs)
        #[arg(long)]
        replace_mode: bool,
    },

    /// Decode one persisted identifier-set value
    DecodeSet {
        /// Path to a file holding the raw value bytes
        file: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
