//! Observable events in the index engine lifecycle

use std::fmt;

/// Events emitted by the engine.
///
/// Event names are stable identifiers: operational tooling greps for
/// them, so renames are breaking changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Bulk build started; leftover run files were wiped
    BuildStart,
    /// One buffer of pending changes was flushed to a run file
    RunFlushed,
    /// Bulk build stopped; all run files are complete
    BuildStop,
    /// Run files merged into the backing store
    MergeComplete,
    /// A transaction scope flushed its buffered index updates
    CacheFlush,
    /// A run file passed verification
    VerifyOk,
    /// A run file failed verification
    VerifyFailed,
}

impl Event {
    /// Returns the stable event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BuildStart => "INDEX_BUILD_START",
            Event::RunFlushed => "INDEX_RUN_FLUSHED",
            Event::BuildStop => "INDEX_BUILD_STOP",
            Event::MergeComplete => "INDEX_MERGE_COMPLETE",
            Event::CacheFlush => "INDEX_CACHE_FLUSH",
            Event::VerifyOk => "INDEX_VERIFY_OK",
            Event::VerifyFailed => "INDEX_VERIFY_FAILED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
