//! Inspection CLI
//!
//! Operational tooling over the engine's on-disk artifacts:
//! - dump-run: print the records of a run file
//! - verify-run: check a run file's ordering contract
//! - decode-set: decode one persisted identifier-set value

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::run_command;
pub use errors::{CliError, CliResult};

/// Parses arguments and dispatches the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}
