//! Bulk index building
//!
//! One attribute index is built per load by an external sort-merge
//! pipeline: record key changes buffer in memory, flush as sorted run
//! files, and merge into the backing store in one ordered pass.
//!
//! # API
//!
//! - [`BulkIndexBuilder`] - `start` / `process` / `stop` state machine
//! - [`RecordIndexer`] - collaborator deriving index keys from records
//! - [`RunWriter`] / [`RunReader`] - the intermediate run-file format
//! - [`merge_runs`] - fold run files into an [`crate::index::IndexStore`]
//! - [`verify_run_file`] - ordering check for operational tooling

mod bulk;
mod errors;
mod merge;
mod run;

pub use bulk::{BuildMode, BulkIndexBuilder, KeyDelta, RecordIndexer};
pub use errors::{BuildError, BuildResult};
pub use merge::{merge_runs, MergeStats};
pub use run::{verify_run_file, RunReader, RunRecord, RunStats, RunWriter};
