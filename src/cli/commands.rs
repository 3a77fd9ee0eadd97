//! CLI command implementations
//!
//! Thin wrappers over the library: open the artifact, print what it
//! holds, exit non-zero if it is corrupt. Output goes to stdout one
//! line per record so it pipes cleanly.

use std::fs;
use std::path::Path;

use crate::builder::{verify_run_file, RunReader, RunRecord};
use crate::idset::{codec, IdSet};
use crate::observability::{Event, Logger};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Dispatches one parsed command.
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::DumpRun { file, replace_mode } => dump_run(&file, replace_mode),
        Command::VerifyRun { file, replace_mode } => verify_run(&file, replace_mode),
        Command::DecodeSet { file } => decode_set(&file),
    }
}

/// Prints every record of a run file.
pub fn dump_run(file: &Path, replace_mode: bool) -> CliResult<()> {
    let mut reader = RunReader::open(file, replace_mode)?;
    let mut records = 0u64;
    while let Some(record) = reader.read_next()? {
        print_record(&record);
        records += 1;
    }
    println!("# {} records", records);
    Ok(())
}

fn print_record(record: &RunRecord) {
    let mut line = format!(
        "key={} added[{}]={:?}",
        hex(&record.key),
        record.added_count(),
        ids_of(&record.added)
    );
    if let Some(removed) = &record.removed {
        line.push_str(&format!(
            " removed[{}]={:?}",
            record.removed_count(),
            ids_of(removed)
        ));
    }
    println!("{}", line);
}

/// Verifies a run file's ordering contract.
pub fn verify_run(file: &Path, replace_mode: bool) -> CliResult<()> {
    match verify_run_file(file, replace_mode) {
        Ok(stats) => {
            Logger::info(
                Event::VerifyOk.as_str(),
                &[
                    ("added_ids", &stats.added_ids.to_string()),
                    ("file", &file.display().to_string()),
                    ("records", &stats.records.to_string()),
                    ("removed_ids", &stats.removed_ids.to_string()),
                ],
            );
            Ok(())
        }
        Err(e) => {
            Logger::error(
                Event::VerifyFailed.as_str(),
                &[
                    ("error", &e.to_string()),
                    ("file", &file.display().to_string()),
                ],
            );
            Err(e.into())
        }
    }
}

/// Decodes one persisted identifier-set value from a file.
pub fn decode_set(file: &Path) -> CliResult<()> {
    let bytes = fs::read(file).map_err(|source| CliError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    match codec::decode(&bytes)? {
        IdSet::Empty => println!("empty"),
        IdSet::Unbounded => println!("unbounded"),
        IdSet::Defined(ids) => println!("defined[{}]={:?}", ids.len(), ids),
    }
    Ok(())
}

fn ids_of(run: &[u8]) -> Vec<u64> {
    run.chunks_exact(8)
        .map(|chunk| u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes")))
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
