//! Observability for the index engine
//!
//! Structured JSON logging only:
//! - One log line = one event
//! - Synchronous, no buffering, no background threads
//! - Deterministic field ordering (alphabetical)
//! - Severity is explicit on every line
//!
//! Observability is read-only: emitting a log line never changes engine
//! behavior, and a failed write to stdout/stderr is ignored.

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};
