//! Test outcome model: status, metrics, result, scenario descriptor.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a test is in its lifecycle, and how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    #[default]
    NotRun,
    Running,
    Passed,
    Failed,
    Skipped,
    Timeout,
}

impl TestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRun => "not-run",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Timeout => "timeout",
        }
    }

    /// Terminal states can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped | Self::Timeout)
    }
}

/// Quantities collected while a test runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TestMetrics {
    pub execution_time: Duration,
    pub setup_time: Duration,
    pub teardown_time: Duration,
    pub resource_acquisitions: u32,
    pub resource_conflicts: u32,
    pub messages_sent: u32,
    pub messages_received: u32,
    pub error_count: u32,
    pub warning_count: u32,
    /// Free-form named measurements recorded by the test body.
    pub custom: HashMap<String, f64>,
}

/// Everything known about one finished (or skipped) test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub description: String,
    pub status: TestStatus,
    pub error_message: Option<String>,
    pub metrics: TestMetrics,
    /// Ordered log lines captured through the test context.
    pub log: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TestResult {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: TestStatus::NotRun,
            error_message: None,
            metrics: TestMetrics::default(),
            log: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the test running and stamp the start time.
    pub fn start(&mut self) {
        self.status = TestStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Move to a terminal status and stamp the end time.
    ///
    /// The first terminal status wins; later calls are ignored.
    pub fn finalize(&mut self, status: TestStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error_message = error;
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.status, TestStatus::Passed)
    }
}

/// Static description of one test: identity, requirements, limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub required_drivers: Vec<String>,
    pub required_resources: Vec<String>,
    /// Scenario-local configuration knobs.
    pub config: HashMap<String, String>,
    pub timeout: Duration,
    /// Platform names this scenario may run on. Empty means everywhere.
    pub platform_restrictions: Vec<String>,
}

impl TestScenario {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required_drivers: Vec::new(),
            required_resources: Vec::new(),
            config: HashMap::new(),
            timeout: Duration::from_secs(30),
            platform_restrictions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_driver(mut self, name: impl Into<String>) -> Self {
        self.required_drivers.push(name.into());
        self
    }

    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>) -> Self {
        self.required_resources.push(name.into());
        self
    }

    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn restrict_to(mut self, platforms: &[&str]) -> Self {
        self.platform_restrictions = platforms.iter().map(ToString::to_string).collect();
        self
    }

    /// Whether this scenario is allowed on the named platform.
    #[must_use]
    pub fn allowed_on(&self, platform: &str) -> bool {
        self.platform_restrictions.is_empty()
            || self
                .platform_restrictions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_is_idempotent() {
        let mut result = TestResult::new("t", "d");
        result.start();
        assert_eq!(result.status, TestStatus::Running);

        result.finalize(TestStatus::Failed, Some("first".to_string()));
        result.finalize(TestStatus::Passed, None);
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("first"));
        assert!(result.finished_at.is_some());
    }

    #[test]
    fn running_is_not_terminal() {
        assert!(!TestStatus::NotRun.is_terminal());
        assert!(!TestStatus::Running.is_terminal());
        for status in [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Skipped,
            TestStatus::Timeout,
        ] {
            assert!(status.is_terminal(), "{status:?} should be terminal");
        }
    }

    #[test]
    fn empty_restrictions_allow_everywhere() {
        let scenario = TestScenario::new("t", "d");
        assert!(scenario.allowed_on("Dreamcast"));
        assert!(scenario.allowed_on("Linux"));
    }

    #[test]
    fn restrictions_match_case_insensitively() {
        let scenario = TestScenario::new("t", "d").restrict_to(&["Linux", "macOS"]);
        assert!(scenario.allowed_on("linux"));
        assert!(scenario.allowed_on("MACOS"));
        assert!(!scenario.allowed_on("Dreamcast"));
    }

    #[test]
    fn builder_accumulates_requirements() {
        let scenario = TestScenario::new("t", "d")
            .with_driver("memory")
            .with_driver("gpu")
            .with_resource("vram")
            .with_config("iterations", "100")
            .with_timeout(Duration::from_millis(250));
        assert_eq!(scenario.required_drivers, vec!["memory", "gpu"]);
        assert_eq!(scenario.required_resources, vec!["vram"]);
        assert_eq!(scenario.config.get("iterations").map(String::as_str), Some("100"));
        assert_eq!(scenario.timeout, Duration::from_millis(250));
    }

    #[test]
    fn result_serializes_to_json() {
        let mut result = TestResult::new("serde", "round trip");
        result.start();
        result.metrics.custom.insert("ops".to_string(), 42.0);
        result.finalize(TestStatus::Passed, None);
        let json = serde_json::to_string(&result).expect("serialize");
        assert!(json.contains("\"passed\""));
        assert!(json.contains("\"ops\""));
    }
}
