//! dirbase CLI entry point
//!
//! A minimal entrypoint that parses arguments, dispatches to the CLI
//! module, prints errors to stderr, and exits non-zero on failure.
//! All logic lives in the library.

use dirbase::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
