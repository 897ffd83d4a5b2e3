//! JSONL run log: append-only line-delimited JSON of harness activity.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` so a tailing process never sees an
//! interleaved partial line.
//!
//! Three-level fallback chain:
//! 1. Primary file path
//! 2. stderr with `[HTK-JSONL]` prefix
//! 3. Silent discard (a test run must never abort for logging failures)

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::executor::result::{TestResult, TestStatus};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types matching the harness activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SuiteStart,
    SuiteComplete,
    TestPassed,
    TestFailed,
    TestSkipped,
    TestTimeout,
    InjectionEnabled,
    InjectionDisabled,
    BenchmarkComplete,
    Error,
}

/// A single JSONL entry. Only `ts`, `event`, and `severity` are mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventKind, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339(),
            event,
            severity,
            test: None,
            platform: None,
            duration_ms: None,
            ok: None,
            error_message: None,
            details: None,
        }
    }

    /// Entry summarizing one finished test result.
    #[must_use]
    pub fn for_result(result: &TestResult) -> Self {
        let (event, severity) = match result.status {
            TestStatus::Passed => (EventKind::TestPassed, Severity::Info),
            TestStatus::Skipped => (EventKind::TestSkipped, Severity::Info),
            TestStatus::Timeout => (EventKind::TestTimeout, Severity::Critical),
            _ => (EventKind::TestFailed, Severity::Warning),
        };
        let mut entry = Self::new(event, severity);
        entry.test = Some(result.name.clone());
        entry.duration_ms =
            u64::try_from(result.metrics.execution_time.as_millis()).ok();
        entry.ok = Some(result.passed());
        entry.error_message = result.error_message.clone();
        entry
    }
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Configuration for the run log writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Log file path. `None` disables file logging entirely.
    pub path: Option<PathBuf>,
    /// Fall back to stderr instead of discarding when the file fails.
    pub stderr_fallback: bool,
}

/// Append-only JSONL writer with graceful degradation.
pub struct JsonlWriter {
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open the log file, falling through the degradation chain on failure.
    #[must_use]
    pub fn open(config: &JsonlConfig) -> Self {
        let fallback = if config.stderr_fallback {
            WriterState::Stderr
        } else {
            WriterState::Discard
        };
        let Some(path) = &config.path else {
            return Self {
                writer: None,
                state: fallback,
                lines_written: 0,
            };
        };
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                writer: Some(BufWriter::with_capacity(64 * 1024, file)),
                state: WriterState::Normal,
                lines_written: 0,
            },
            Err(err) => {
                let _ = writeln!(
                    io::stderr(),
                    "[HTK-JSONL] cannot open {}: {err}",
                    path.display()
                );
                Self {
                    writer: None,
                    state: fallback,
                    lines_written: 0,
                }
            }
        }
    }

    /// Write one entry as one atomic line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(err) => {
                let _ = writeln!(io::stderr(), "[HTK-JSONL] serialize error: {err}");
                return;
            }
        };

        match self.state {
            WriterState::Normal => {
                if let Some(writer) = self.writer.as_mut() {
                    if writer.write_all(line.as_bytes()).is_err() {
                        self.state = WriterState::Stderr;
                        self.writer = None;
                        let _ = write!(io::stderr(), "[HTK-JSONL] {line}");
                        self.lines_written += 1;
                        return;
                    }
                    self.lines_written += 1;
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[HTK-JSONL] {line}");
                self.lines_written += 1;
            }
            WriterState::Discard => {}
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }

    /// Current degradation state label.
    #[must_use]
    pub const fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    #[must_use]
    pub const fn lines_written(&self) -> u64 {
        self.lines_written
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn entries_land_as_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.jsonl");
        let mut writer = JsonlWriter::open(&JsonlConfig {
            path: Some(path.clone()),
            stderr_fallback: false,
        });
        assert_eq!(writer.state(), "normal");

        let mut entry = LogEntry::new(EventKind::SuiteStart, Severity::Info);
        entry.platform = Some("Linux".to_string());
        writer.write_entry(&entry);
        writer.write_entry(&LogEntry::new(EventKind::SuiteComplete, Severity::Info));
        writer.flush();
        assert_eq!(writer.lines_written(), 2);

        let raw = fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogEntry = serde_json::from_str(lines[0]).expect("valid json");
        assert_eq!(first.event, EventKind::SuiteStart);
        assert_eq!(first.platform.as_deref(), Some("Linux"));
    }

    #[test]
    fn missing_path_discards_quietly() {
        let mut writer = JsonlWriter::open(&JsonlConfig::default());
        assert_eq!(writer.state(), "discard");
        writer.write_entry(&LogEntry::new(EventKind::Error, Severity::Critical));
        assert_eq!(writer.lines_written(), 0);
    }

    #[test]
    fn unopenable_path_degrades() {
        let config = JsonlConfig {
            path: Some(PathBuf::from("/nonexistent-dir/run.jsonl")),
            stderr_fallback: false,
        };
        let writer = JsonlWriter::open(&config);
        assert_eq!(writer.state(), "discard");
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let entry = LogEntry::new(EventKind::TestPassed, Severity::Info);
        let json = serde_json::to_string(&entry).expect("serialize");
        assert!(!json.contains("error_message"));
        assert!(json.contains("test_passed"));
    }

    #[test]
    fn for_result_maps_status_to_event() {
        let mut result = TestResult::new("t", "d");
        result.start();
        result.finalize(TestStatus::Timeout, Some("deadline".to_string()));
        let entry = LogEntry::for_result(&result);
        assert_eq!(entry.event, EventKind::TestTimeout);
        assert_eq!(entry.severity, Severity::Critical);
        assert_eq!(entry.test.as_deref(), Some("t"));
        assert_eq!(entry.ok, Some(false));
    }
}
