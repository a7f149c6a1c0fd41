//! Proof trace
//!
//! An append-only ordered log of analysis steps. The validator and the
//! preimage/validity components write here; the trace order mirrors the
//! order in which checks were performed and is part of the observable
//! contract.

use serde::Serialize;
use std::fmt;

/// Severity level of a trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    /// Neutral narration
    Info,
    /// A check that passed
    Ok,
    /// A check that passed with a caveat
    Warn,
    /// A check that failed
    Error,
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraceLevel::Info => "info",
            TraceLevel::Ok => "ok",
            TraceLevel::Warn => "warn",
            TraceLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A single proof-trace record
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    /// Severity level
    pub level: TraceLevel,
    /// Human-readable message
    pub message: String,
}

/// Append-only ordered log of trace entries
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProofTrace {
    entries: Vec<TraceEntry>,
}

impl ProofTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the given level
    pub fn push(&mut self, level: TraceLevel, message: impl Into<String>) {
        self.entries.push(TraceEntry {
            level,
            message: message.into(),
        });
    }

    /// Append a neutral narration entry
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(TraceLevel::Info, message);
    }

    /// Append a passed-check entry
    pub fn ok(&mut self, message: impl Into<String>) {
        self.push(TraceLevel::Ok, message);
    }

    /// Append a caveat entry
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(TraceLevel::Warn, message);
    }

    /// Append a failed-check entry
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(TraceLevel::Error, message);
    }

    /// Append a section header
    pub fn section(&mut self, title: impl Into<String>) {
        let title = title.into();
        let underline = "-".repeat(title.len().max(4));
        self.push(TraceLevel::Info, title);
        self.push(TraceLevel::Info, underline);
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trace is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages only, in order (for textual output)
    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_preserves_order() {
        let mut trace = ProofTrace::new();
        trace.info("first");
        trace.ok("second");
        trace.warn("third");

        let messages = trace.messages();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_section_header() {
        let mut trace = ProofTrace::new();
        trace.section("Step 1: Structural Validation");
        assert_eq!(trace.len(), 2);
        assert!(trace.entries()[1].message.starts_with('-'));
    }

    #[test]
    fn test_serialization() {
        let mut trace = ProofTrace::new();
        trace.error("bad");
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json[0]["level"], "error");
        assert_eq!(json[0]["message"], "bad");
    }
}
