//! K-way merge of run files into the backing store
//!
//! Consumes every run file produced by one builder instance in a single
//! pass ordered by key. Added-id runs are unioned, removed-id runs
//! subtracted, and the per-key entry limit applied exactly as
//! incremental updates would have applied it, so a bulk-built index is
//! indistinguishable in content from one built by repeated record
//! updates through the buffered cache.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs;
use std::path::PathBuf;

use crate::idset::{codec, IdSet};
use crate::index::IndexStore;
use crate::observability::{Event, Logger};

use super::errors::{BuildError, BuildResult};
use super::run::{RunReader, RunRecord};

/// Statistics from one merge pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Keys written with a defined or unbounded value
    pub keys_written: u64,
    /// Keys deleted because their merged set came out empty
    pub keys_deleted: u64,
    /// Keys that collapsed past the entry limit
    pub unbounded_keys: u64,
}

/// Heap entry: the next unconsumed record of one run file.
///
/// Ordered by (key, file ordinal) so ties between files resolve in
/// flush order, keeping the merge deterministic.
struct MergeEntry {
    record: RunRecord,
    source: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record.key == other.record.key && self.source == other.source
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record
            .key
            .cmp(&other.record.key)
            .then(self.source.cmp(&other.source))
    }
}

/// Merges `runs` into `store`, applying the entry limit, then deletes
/// the consumed run files.
///
/// `replace_mode` and `limit` must match the settings of the build that
/// produced the runs. On error the run files are left in place; a fresh
/// `start()` on the owning builder wipes them.
pub fn merge_runs<S: IndexStore>(
    runs: &[PathBuf],
    replace_mode: bool,
    limit: usize,
    store: &mut S,
) -> BuildResult<MergeStats> {
    let mut readers = Vec::with_capacity(runs.len());
    let mut heap = BinaryHeap::new();
    for (source, path) in runs.iter().enumerate() {
        let mut reader = RunReader::open(path, replace_mode)?;
        if let Some(record) = reader.read_next()? {
            heap.push(Reverse(MergeEntry { record, source }));
        }
        readers.push(reader);
    }

    let mut stats = MergeStats::default();
    while let Some(Reverse(head)) = heap.pop() {
        let key = head.record.key.clone();
        let mut added = IdSet::Empty;
        let mut removed = IdSet::Empty;

        let mut entry = head;
        loop {
            accumulate(&readers[entry.source], &entry.record, &mut added, &mut removed)?;
            if let Some(record) = readers[entry.source].read_next()? {
                heap.push(Reverse(MergeEntry {
                    record,
                    source: entry.source,
                }));
            }
            let same_key = heap
                .peek()
                .map_or(false, |Reverse(next)| next.record.key == key);
            if !same_key {
                break;
            }
            entry = match heap.pop() {
                Some(Reverse(e)) => e,
                None => break,
            };
        }

        // Fold the run data into whatever the store already holds for
        // this key, the same way incremental updates would have.
        let mut merged = match store.read_for_update(&key)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => IdSet::Empty,
        };
        merged.union_with(&added);
        // Limit first, subtraction second: an over-limit key collapsed
        // during the incremental equivalent and stays collapsed.
        if merged.collapse_if_over_limit(limit) {
            stats.unbounded_keys += 1;
        }
        if merged.is_defined() {
            merged.difference_with(&removed);
        }

        match &merged {
            IdSet::Empty => {
                store.delete(&key)?;
                stats.keys_deleted += 1;
            }
            value => {
                store.write(&key, &codec::encode(value))?;
                stats.keys_written += 1;
            }
        }
    }

    for path in runs {
        fs::remove_file(path).map_err(|e| BuildError::io(path, e))?;
    }
    Logger::info(
        Event::MergeComplete.as_str(),
        &[
            ("keys_deleted", &stats.keys_deleted.to_string()),
            ("keys_written", &stats.keys_written.to_string()),
            ("runs", &runs.len().to_string()),
            ("unbounded_keys", &stats.unbounded_keys.to_string()),
        ],
    );
    Ok(stats)
}

/// Folds one run record into the accumulated added/removed sets.
fn accumulate(
    reader: &RunReader,
    record: &RunRecord,
    added: &mut IdSet,
    removed: &mut IdSet,
) -> BuildResult<()> {
    let added_ids = codec::decode(&record.added)
        .map_err(|e| BuildError::corrupt(reader.path(), 0, e.to_string()))?;
    added.union_with(&added_ids);
    if let Some(removed_run) = &record.removed {
        let removed_ids = codec::decode(removed_run)
            .map_err(|e| BuildError::corrupt(reader.path(), 0, e.to_string()))?;
        removed.union_with(&removed_ids);
    }
    Ok(())
}
