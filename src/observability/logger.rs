//! Structured JSON logger
//!
//! - One JSON object per line, written in a single syscall
//! - `event` first, `severity` second, remaining fields alphabetical
//! - No timestamps: output is deterministic for a given operation
//!   sequence, which keeps log-based tests and diffing exact

use std::fmt;
use std::io::{self, Write};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-operation detail (run flushes, cache flushes)
    Trace = 0,
    /// Lifecycle progress (build start/stop, merge complete)
    Info = 1,
    /// Recoverable oddities (skipped unreadable records)
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable failures
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous structured logger.
///
/// TRACE/INFO/WARN go to stdout; ERROR/FATAL go to stderr.
pub struct Logger;

impl Logger {
    /// Log at TRACE level.
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Trace, event, fields, &mut io::stdout());
    }

    /// Log at INFO level.
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Info, event, fields, &mut io::stdout());
    }

    /// Log at WARN level.
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Warn, event, fields, &mut io::stdout());
    }

    /// Log at ERROR level.
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Error, event, fields, &mut io::stderr());
    }

    /// Log at FATAL level.
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Fatal, event, fields, &mut io::stderr());
    }

    fn emit<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], writer: &mut W) {
        let line = Self::render(severity, event, fields);
        // A logging failure must never fail the operation being logged.
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    /// Renders one log line, `event` first, fields alphabetical.
    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut line = String::with_capacity(128);
        line.push_str("{\"event\":\"");
        escape_into(&mut line, event);
        line.push_str("\",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push('"');

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);
        for (key, value) in sorted {
            line.push_str(",\"");
            escape_into(&mut line, key);
            line.push_str("\":\"");
            escape_into(&mut line, value);
            line.push('"');
        }

        line.push_str("}\n");
        line
    }
}

/// JSON string escaping for keys and values.
fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}
