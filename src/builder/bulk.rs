//! The bulk index builder
//!
//! Builds one attribute index during a full-data load without issuing a
//! random-access write per record. Pending (key, id, delete) changes
//! accumulate in memory up to a byte budget, then flush as a sorted run
//! file; an external merge folds the run files into the backing store.
//!
//! Lifecycle is strictly sequential: `start` → `process`* → `stop`.
//! One builder instance per loading thread; the run-file prefix
//! incorporates the thread identity so sibling builders for other
//! attributes never collide in the shared scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::idset::RecordId;
use crate::observability::{Event, Logger};

use super::errors::{BuildError, BuildResult};
use super::run::RunWriter;

/// Index-key delta for one record replacement.
///
/// `added` and `removed` are disjoint: a key the old and new record
/// share appears in neither. Computing the delta is the indexer's job.
#[derive(Debug, Default, Clone)]
pub struct KeyDelta {
    /// Keys the new record matches and the old one did not
    pub added: Vec<Vec<u8>>,
    /// Keys the old record matched and the new one does not
    pub removed: Vec<Vec<u8>>,
}

/// Collaborator that derives index keys from records.
///
/// Per-attribute normalization and matching rules live behind this
/// trait; the builder only sees opaque key bytes.
pub trait RecordIndexer<R> {
    /// Index keys matched by `record`.
    fn keys(&self, record: &R) -> Vec<Vec<u8>>;

    /// Disjoint added/removed key sets for replacing `old` with `new`.
    fn key_delta(&self, old: &R, new: &R) -> KeyDelta;
}

/// Whether the build replaces existing index data.
///
/// Replace mode buffers removals alongside insertions and sorts pending
/// changes by (key, id): removed and added ids arrive out of global
/// order across records. Append mode buffers insertions only and sorts
/// by key alone: identifiers are assigned monotonically at record
/// creation, so ids within one key already arrive ascending, and the
/// stable sort preserves that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Pure insert load into a fresh index
    Append,
    /// Re-index over existing data; removals are tracked
    Replace,
}

/// One buffered pending change.
#[derive(Debug)]
struct PendingChange {
    key: Vec<u8>,
    id: RecordId,
    is_delete: bool,
}

/// Fixed per-change cost beyond the key bytes (id + delete flag).
const CHANGE_OVERHEAD: usize = 9;

/// External sort-merge builder for one attribute index.
pub struct BulkIndexBuilder {
    prefix: String,
    scratch_dir: PathBuf,
    mode: BuildMode,
    byte_budget: usize,
    buffer: Vec<PendingChange>,
    buffered_bytes: usize,
    runs: Vec<PathBuf>,
    next_run: u32,
    started: bool,
}

impl BulkIndexBuilder {
    /// Creates a builder for the index called `name`.
    ///
    /// `byte_budget` bounds the in-memory buffer; each pending change
    /// costs its key length plus a fixed overhead against the budget.
    pub fn new(name: &str, scratch_dir: &Path, mode: BuildMode, byte_budget: usize) -> Self {
        Self {
            prefix: format!("{}_t{}", name, thread_suffix()),
            scratch_dir: scratch_dir.to_path_buf(),
            mode,
            byte_budget: byte_budget.max(1),
            buffer: Vec::new(),
            buffered_bytes: 0,
            runs: Vec::new(),
            next_run: 0,
            started: false,
        }
    }

    /// The run-file name prefix owned by this builder.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Run files produced so far, in flush order.
    pub fn run_files(&self) -> &[PathBuf] {
        &self.runs
    }

    /// Begins a build: wipes leftover run files from any previous
    /// (possibly aborted) run with this builder's prefix, and resets
    /// the buffer. Re-running a failed build is therefore idempotent.
    pub fn start(&mut self) -> BuildResult<()> {
        self.discard_leftover_runs()?;
        self.buffer.clear();
        self.buffered_bytes = 0;
        self.runs.clear();
        self.next_run = 0;
        self.started = true;
        Logger::info(
            Event::BuildStart.as_str(),
            &[("index", &self.prefix), ("mode", mode_name(self.mode))],
        );
        Ok(())
    }

    /// Buffers the key changes for one record transition.
    ///
    /// A pure insert passes `old = None`; a replacement passes the old
    /// record and enqueues removals for keys it no longer matches.
    /// Flushes a run file first if the buffer is at capacity.
    pub fn process<R, I: RecordIndexer<R>>(
        &mut self,
        indexer: &I,
        old: Option<&R>,
        new: &R,
        id: RecordId,
    ) -> BuildResult<()> {
        debug_assert!(self.started, "process() before start()");
        match (self.mode, old) {
            (BuildMode::Replace, Some(old)) => {
                let delta = indexer.key_delta(old, new);
                for key in delta.added {
                    self.enqueue(key, id, false)?;
                }
                for key in delta.removed {
                    self.enqueue(key, id, true)?;
                }
            }
            _ => {
                for key in indexer.keys(new) {
                    self.enqueue(key, id, false)?;
                }
            }
        }
        Ok(())
    }

    /// Ends the build, flushing any remaining buffered changes.
    pub fn stop(&mut self) -> BuildResult<()> {
        debug_assert!(self.started, "stop() before start()");
        if !self.buffer.is_empty() {
            self.flush_run()?;
        }
        self.started = false;
        Logger::info(
            Event::BuildStop.as_str(),
            &[
                ("index", &self.prefix),
                ("runs", &self.runs.len().to_string()),
            ],
        );
        Ok(())
    }

    fn enqueue(&mut self, key: Vec<u8>, id: RecordId, is_delete: bool) -> BuildResult<()> {
        let cost = key.len() + CHANGE_OVERHEAD;
        if !self.buffer.is_empty() && self.buffered_bytes + cost > self.byte_budget {
            self.flush_run()?;
        }
        self.buffered_bytes += cost;
        self.buffer.push(PendingChange { key, id, is_delete });
        Ok(())
    }

    /// Sorts the buffer and writes it out as one run file.
    ///
    /// The sort key is chosen at construction time via the build mode;
    /// the merge pass below it is a single linear scan that emits one
    /// record per key boundary.
    fn flush_run(&mut self) -> BuildResult<()> {
        match self.mode {
            BuildMode::Replace => self
                .buffer
                .sort_by(|a, b| a.key.cmp(&b.key).then(a.id.cmp(&b.id))),
            BuildMode::Append => self.buffer.sort_by(|a, b| a.key.cmp(&b.key)),
        }

        let path = self
            .scratch_dir
            .join(format!("{}_{:06}.run", self.prefix, self.next_run));
        let mut writer = RunWriter::create(&path)?;
        let replace = self.mode == BuildMode::Replace;

        let mut current_key: Option<&[u8]> = None;
        let mut added_run: Vec<u8> = Vec::new();
        let mut removed_run: Vec<u8> = Vec::new();
        let mut last_added: Option<RecordId> = None;
        let mut last_removed: Option<RecordId> = None;
        for change in &self.buffer {
            if current_key != Some(change.key.as_slice()) {
                if let Some(key) = current_key {
                    writer.write_record(
                        key,
                        &added_run,
                        replace.then_some(removed_run.as_slice()),
                    )?;
                    added_run.clear();
                    removed_run.clear();
                }
                current_key = Some(change.key.as_slice());
                last_added = None;
                last_removed = None;
            }
            // A record matching the same key twice produces adjacent
            // duplicates after the sort; each id is emitted once.
            if change.is_delete {
                if last_removed != Some(change.id) {
                    removed_run.extend_from_slice(&change.id.to_be_bytes());
                    last_removed = Some(change.id);
                }
            } else if last_added != Some(change.id) {
                added_run.extend_from_slice(&change.id.to_be_bytes());
                last_added = Some(change.id);
            }
        }
        if let Some(key) = current_key {
            writer.write_record(key, &added_run, replace.then_some(removed_run.as_slice()))?;
        }

        let records = writer.finish()?;
        Logger::trace(
            Event::RunFlushed.as_str(),
            &[
                ("changes", &self.buffer.len().to_string()),
                ("file", &path.display().to_string()),
                ("records", &records.to_string()),
            ],
        );

        self.buffer.clear();
        self.buffered_bytes = 0;
        self.runs.push(path);
        self.next_run += 1;
        Ok(())
    }

    /// Deletes every file in the scratch directory carrying this
    /// builder's prefix. Partial files from a failed flush are included.
    fn discard_leftover_runs(&self) -> BuildResult<()> {
        let entries = match fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.scratch_dir)
                    .map_err(|e| BuildError::io(&self.scratch_dir, e))?;
                return Ok(());
            }
            Err(e) => return Err(BuildError::io(&self.scratch_dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| BuildError::io(&self.scratch_dir, e))?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&self.prefix) {
                fs::remove_file(entry.path()).map_err(|e| BuildError::io(&entry.path(), e))?;
            }
        }
        Ok(())
    }
}

fn mode_name(mode: BuildMode) -> &'static str {
    match mode {
        BuildMode::Append => "append",
        BuildMode::Replace => "replace",
    }
}

/// Digits of the current thread's identifier, for the run-file prefix.
fn thread_suffix() -> String {
    let id = format!("{:?}", std::thread::current().id());
    id.chars().filter(|c| c.is_ascii_digit()).collect()
}
