//! Append-only JSONL logging of harness activity with graceful degradation.

pub mod jsonl;

pub use jsonl::{EventKind, JsonlConfig, JsonlWriter, LogEntry, Severity};
