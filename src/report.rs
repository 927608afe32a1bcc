//! Verification report types: the ordered log trail and the final verdict.
//!
//! Every verification run produces a fresh, append-only sequence of
//! [`LogEntry`] values plus an explicit pass/fail verdict. Callers render
//! the trail verbatim; nothing in it is ever mutated after being appended.

use serde::{Deserialize, Serialize};

/// Severity of a single trail entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Contextual detail (queried names, parsed fields, dates)
    Info,
    /// A verification step passed
    Success,
    /// Trust-relevant but non-fatal (missing DNSSEC, legacy format)
    Warning,
    /// A verification step failed; the run halted here
    Error,
}

/// One entry in the audit trail of a verification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Human-readable line, rendered verbatim by callers
    pub content: String,
    /// Severity used for styling and programmatic filtering
    pub level: LogLevel,
}

/// Aggregate outcome of one verification run.
///
/// `success` is authoritative — consumers never need to inspect log text.
/// `total_tests` is always 8, including runs halted before any step ran,
/// so pass rates are comparable across failure points.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Steps that passed before the run completed or halted
    pub tests_passed: u32,
    /// Fixed step count (8)
    pub total_tests: u32,
    /// True iff every step passed
    pub success: bool,
    /// Ordered audit trail for this run
    pub logs: Vec<LogEntry>,
}

/// Append-only builder for the audit trail of a single run.
#[derive(Debug, Default)]
pub struct Trail {
    entries: Vec<LogEntry>,
}

impl Trail {
    /// Start an empty trail
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an `info` entry
    pub fn info(&mut self, content: impl Into<String>) {
        self.push(content, LogLevel::Info);
    }

    /// Append a `success` entry
    pub fn success(&mut self, content: impl Into<String>) {
        self.push(content, LogLevel::Success);
    }

    /// Append a `warning` entry
    pub fn warning(&mut self, content: impl Into<String>) {
        self.push(content, LogLevel::Warning);
    }

    /// Append an `error` entry
    pub fn error(&mut self, content: impl Into<String>) {
        self.push(content, LogLevel::Error);
    }

    fn push(&mut self, content: impl Into<String>, level: LogLevel) {
        self.entries.push(LogEntry {
            content: content.into(),
            level,
        });
    }

    /// Consume the trail into its ordered entries
    #[must_use]
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    /// Entries appended so far
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}
