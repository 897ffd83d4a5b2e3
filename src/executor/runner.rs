//! Timeout-bounded test execution: context, case trait, registry, runner.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{RecvTimeoutError, bounded};
use parking_lot::Mutex;
use regex::Regex;

use crate::coordinator::DriverCoordinator;
use crate::core::config::ExecutorConfig;
use crate::core::errors::{Result, TestkitError};
use crate::executor::result::{TestMetrics, TestResult, TestStatus};
use crate::logger::jsonl::{JsonlWriter, LogEntry};
use crate::platform::profile::PlatformKind;

/// Services a test body gets while it runs.
///
/// Cheap to clone; all clones share the same metrics and log so the caller
/// can still read them after a timeout strands the worker thread.
#[derive(Clone)]
pub struct TestContext {
    platform: PlatformKind,
    coordinator: Arc<DriverCoordinator>,
    shared: Arc<Mutex<ContextShared>>,
}

#[derive(Default)]
struct ContextShared {
    metrics: TestMetrics,
    log: Vec<String>,
}

impl TestContext {
    #[must_use]
    pub fn new(platform: PlatformKind, coordinator: Arc<DriverCoordinator>) -> Self {
        Self {
            platform,
            coordinator,
            shared: Arc::new(Mutex::new(ContextShared::default())),
        }
    }

    /// Platform the executor resolved for this run.
    #[must_use]
    pub const fn platform(&self) -> PlatformKind {
        self.platform
    }

    /// Coordinator shared by every test in the run.
    #[must_use]
    pub fn coordinator(&self) -> Arc<DriverCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Fail the test when `condition` is false.
    ///
    /// The failure both increments the error count and propagates as an
    /// assertion error, so a single `?` stops the stage.
    pub fn assert_that(&self, condition: bool, message: impl Into<String>) -> Result<()> {
        if condition {
            return Ok(());
        }
        let message = message.into();
        let mut shared = self.shared.lock();
        shared.metrics.error_count += 1;
        shared.log.push(format!("[{}] assertion failed: {message}", Utc::now().format("%H:%M:%S%.3f")));
        Err(TestkitError::AssertionFailed { message })
    }

    /// Record a named measurement on the test's metrics.
    pub fn record_metric(&self, name: impl Into<String>, value: f64) {
        self.shared.lock().metrics.custom.insert(name.into(), value);
    }

    /// Append a timestamped line to the test log.
    pub fn log(&self, message: impl Into<String>) {
        self.shared
            .lock()
            .log
            .push(format!("[{}] {}", Utc::now().format("%H:%M:%S%.3f"), message.into()));
    }

    /// Record a warning without failing the test.
    pub fn warn(&self, message: impl Into<String>) {
        let mut shared = self.shared.lock();
        shared.metrics.warning_count += 1;
        shared.log.push(format!("[{}] warning: {}", Utc::now().format("%H:%M:%S%.3f"), message.into()));
    }

    /// Poll `condition` every 10ms until it holds or the deadline passes.
    pub fn wait_for(&self, condition: impl Fn() -> bool, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if condition() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(TestkitError::runtime(format!(
                    "condition not met within {timeout:?}"
                )));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn snapshot(&self) -> (TestMetrics, Vec<String>) {
        let shared = self.shared.lock();
        (shared.metrics.clone(), shared.log.clone())
    }

    fn add_stage_times(&self, setup: Duration, execute: Duration, teardown: Duration) {
        let mut shared = self.shared.lock();
        shared.metrics.setup_time = setup;
        shared.metrics.execution_time = execute;
        shared.metrics.teardown_time = teardown;
    }
}

/// One runnable test.
///
/// Only `scenario` and `execute` are mandatory; the remaining stages default
/// to no-ops.
pub trait TestCase: Send {
    /// Static descriptor: name, requirements, timeout, restrictions.
    fn scenario(&self) -> crate::executor::result::TestScenario;

    fn setup(&mut self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    /// The test body.
    fn execute(&mut self, ctx: &TestContext) -> Result<()>;

    fn teardown(&mut self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    fn validate_preconditions(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    fn validate_postconditions(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.scenario().name)
            .finish_non_exhaustive()
    }
}

/// Runs single cases with a platform gate and a hard deadline.
pub struct TestExecutor {
    platform: PlatformKind,
    default_timeout: Duration,
    verbose: bool,
}

impl Default for TestExecutor {
    fn default() -> Self {
        Self::new(&ExecutorConfig::default())
    }
}

impl TestExecutor {
    /// Executor configured from the harness config, resolving the platform
    /// override if one is set.
    #[must_use]
    pub fn new(config: &ExecutorConfig) -> Self {
        let platform = config
            .platform_override
            .as_deref()
            .and_then(|name| PlatformKind::parse(name).ok())
            .unwrap_or_else(PlatformKind::detect);
        Self {
            platform,
            default_timeout: config.default_timeout(),
            verbose: config.verbose,
        }
    }

    /// Executor pinned to an explicit platform.
    #[must_use]
    pub const fn for_platform(platform: PlatformKind, default_timeout: Duration) -> Self {
        Self {
            platform,
            default_timeout,
            verbose: false,
        }
    }

    #[must_use]
    pub const fn platform(&self) -> PlatformKind {
        self.platform
    }

    /// Run one case to completion, timeout, or skip.
    ///
    /// The staged body runs on a worker thread; the caller blocks on a
    /// bounded(1) channel with the scenario deadline. On timeout the worker
    /// is left detached rather than cancelled, so a hung driver call leaks
    /// one thread instead of poisoning shared state mid-operation.
    pub fn run_case(&self, mut case: Box<dyn TestCase + 'static>) -> TestResult {
        let scenario = case.scenario();
        let mut result = TestResult::new(scenario.name.clone(), scenario.description.clone());
        result.start();

        if !scenario.allowed_on(self.platform.as_str()) {
            result.finalize(
                TestStatus::Skipped,
                Some(format!(
                    "not supported on {}: requires one of {:?}",
                    self.platform, scenario.platform_restrictions
                )),
            );
            return result;
        }

        let timeout = if scenario.timeout.is_zero() {
            self.default_timeout
        } else {
            scenario.timeout
        };

        let coordinator = Arc::new(DriverCoordinator::new());
        let ctx = TestContext::new(self.platform, coordinator);
        let worker_ctx = ctx.clone();
        let (tx, rx) = bounded::<Result<()>>(1);

        let handle = thread::spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| run_stages(&mut case, &worker_ctx)))
                .unwrap_or_else(|_| Err(TestkitError::runtime("test body panicked")));
            // A timed-out caller has dropped the receiver; nothing to report.
            let _ = tx.send(outcome);
        });

        match rx.recv_timeout(timeout) {
            Ok(outcome) => {
                // Worker finished; joining cannot block meaningfully.
                let _ = handle.join();
                let (metrics, log) = ctx.snapshot();
                result.metrics = metrics;
                result.log = log;
                match outcome {
                    Ok(()) => result.finalize(TestStatus::Passed, None),
                    Err(err) => result.finalize(TestStatus::Failed, Some(err.to_string())),
                }
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                // Detach: the worker keeps running against its own context
                // clone and is reclaimed at process exit.
                drop(handle);
                let (metrics, log) = ctx.snapshot();
                result.metrics = metrics;
                result.log = log;
                result.finalize(
                    TestStatus::Timeout,
                    Some(
                        TestkitError::TestTimeout {
                            name: scenario.name.clone(),
                            timeout,
                        }
                        .to_string(),
                    ),
                );
            }
        }

        if self.verbose {
            eprintln!("[{}] {}", result.status.as_str(), result.name);
        }
        result
    }
}

fn run_stages(case: &mut Box<dyn TestCase>, ctx: &TestContext) -> Result<()> {
    let setup_start = Instant::now();
    case.setup(ctx)?;
    let setup_time = setup_start.elapsed();

    case.validate_preconditions(ctx)?;

    let execute_start = Instant::now();
    let executed = case.execute(ctx);
    let execution_time = execute_start.elapsed();

    // Teardown runs even when the body failed.
    let teardown_start = Instant::now();
    let torn_down = case.teardown(ctx);
    let teardown_time = teardown_start.elapsed();

    ctx.add_stage_times(setup_time, execution_time, teardown_time);

    executed?;
    torn_down?;
    case.validate_postconditions(ctx)
}

type CaseFactory = Box<dyn Fn() -> Box<dyn TestCase> + Send + Sync>;

/// Name-keyed test factories.
#[derive(Default)]
pub struct TestRegistry {
    factories: HashMap<String, CaseFactory>,
}

impl TestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under the case's scenario name.
    pub fn register<F, C>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: TestCase + 'static,
    {
        self.factories
            .insert(name.into(), Box::new(move || Box::new(factory())));
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a fresh case.
    pub fn create(&self, name: &str) -> Result<Box<dyn TestCase>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| TestkitError::UnknownTest {
                name: name.to_string(),
            })
    }
}

/// Per-suite totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuiteTotals {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
}

impl SuiteTotals {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.timed_out
    }

    /// Failures and timeouts both count against the suite.
    #[must_use]
    pub const fn all_green(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Runs registered cases and renders suite reports.
pub struct SuiteRunner {
    executor: TestExecutor,
    registry: TestRegistry,
    event_log: Option<Mutex<JsonlWriter>>,
}

impl SuiteRunner {
    #[must_use]
    pub fn new(executor: TestExecutor, registry: TestRegistry) -> Self {
        Self {
            executor,
            registry,
            event_log: None,
        }
    }

    /// Append a JSONL entry per finished test to the given writer.
    #[must_use]
    pub fn with_event_log(mut self, writer: JsonlWriter) -> Self {
        self.event_log = Some(Mutex::new(writer));
        self
    }

    #[must_use]
    pub const fn executor(&self) -> &TestExecutor {
        &self.executor
    }

    /// Run one registered case by name.
    pub fn run_one(&self, name: &str) -> Result<TestResult> {
        let case = self.registry.create(name)?;
        let result = self.executor.run_case(case);
        if let Some(log) = &self.event_log {
            log.lock().write_entry(&LogEntry::for_result(&result));
        }
        Ok(result)
    }

    /// Run every registered case, in name order.
    #[must_use]
    pub fn run_all(&self) -> Vec<TestResult> {
        self.registry
            .names()
            .iter()
            .filter_map(|name| self.run_one(name).ok())
            .collect()
    }

    /// Run cases whose names match the regex.
    pub fn run_matching(&self, pattern: &str) -> Result<Vec<TestResult>> {
        let matcher = Regex::new(pattern).map_err(|err| TestkitError::InvalidPattern {
            pattern: pattern.to_string(),
            details: err.to_string(),
        })?;
        Ok(self
            .registry
            .names()
            .iter()
            .filter(|name| matcher.is_match(name))
            .filter_map(|name| self.run_one(name).ok())
            .collect())
    }

    /// Tally results by terminal status.
    #[must_use]
    pub fn totals(results: &[TestResult]) -> SuiteTotals {
        let mut totals = SuiteTotals::default();
        for result in results {
            match result.status {
                TestStatus::Passed => totals.passed += 1,
                TestStatus::Failed => totals.failed += 1,
                TestStatus::Skipped => totals.skipped += 1,
                TestStatus::Timeout => totals.timed_out += 1,
                TestStatus::NotRun | TestStatus::Running => {}
            }
        }
        totals
    }

    /// Human-readable suite report with per-test detail.
    #[must_use]
    pub fn generate_report(&self, results: &[TestResult]) -> String {
        let totals = Self::totals(results);
        let mut out = String::new();
        let _ = writeln!(out, "=== Test Suite Report ({}) ===", self.executor.platform);
        let _ = writeln!(
            out,
            "{} total: {} passed, {} failed, {} skipped, {} timed out",
            totals.total(),
            totals.passed,
            totals.failed,
            totals.skipped,
            totals.timed_out
        );
        for result in results {
            let _ = writeln!(
                out,
                "\n[{}] {} ({:?})",
                result.status.as_str(),
                result.name,
                result.metrics.execution_time
            );
            if let Some(error) = &result.error_message {
                let _ = writeln!(out, "    {error}");
            }
            let mut custom: Vec<(&String, &f64)> = result.metrics.custom.iter().collect();
            custom.sort_by_key(|(name, _)| name.clone());
            for (name, value) in custom {
                let _ = writeln!(out, "    {name} = {value}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::result::TestScenario;

    fn executor() -> TestExecutor {
        TestExecutor::for_platform(PlatformKind::Linux, Duration::from_secs(5))
    }

    struct PassingCase;

    impl TestCase for PassingCase {
        fn scenario(&self) -> TestScenario {
            TestScenario::new("passing", "always passes")
        }

        fn execute(&mut self, ctx: &TestContext) -> Result<()> {
            ctx.record_metric("answer", 42.0);
            ctx.assert_that(true, "tautology")
        }
    }

    struct FailingCase;

    impl TestCase for FailingCase {
        fn scenario(&self) -> TestScenario {
            TestScenario::new("failing", "assertion fails")
        }

        fn execute(&mut self, ctx: &TestContext) -> Result<()> {
            ctx.assert_that(1 > 2, "one exceeds two")
        }
    }

    struct PanickingCase;

    impl TestCase for PanickingCase {
        fn scenario(&self) -> TestScenario {
            TestScenario::new("panicking", "body panics")
        }

        fn execute(&mut self, _ctx: &TestContext) -> Result<()> {
            panic!("unexpected");
        }
    }

    struct HangingCase;

    impl TestCase for HangingCase {
        fn scenario(&self) -> TestScenario {
            TestScenario::new("hanging", "sleeps past the deadline")
                .with_timeout(Duration::from_millis(50))
        }

        fn execute(&mut self, _ctx: &TestContext) -> Result<()> {
            thread::sleep(Duration::from_secs(3600));
            Ok(())
        }
    }

    struct RestrictedCase {
        setup_ran: Arc<Mutex<bool>>,
    }

    impl TestCase for RestrictedCase {
        fn scenario(&self) -> TestScenario {
            TestScenario::new("restricted", "desktop only").restrict_to(&["Windows"])
        }

        fn setup(&mut self, _ctx: &TestContext) -> Result<()> {
            *self.setup_ran.lock() = true;
            Ok(())
        }

        fn execute(&mut self, _ctx: &TestContext) -> Result<()> {
            Ok(())
        }
    }

    struct TeardownTrackingCase {
        torn_down: Arc<Mutex<bool>>,
    }

    impl TestCase for TeardownTrackingCase {
        fn scenario(&self) -> TestScenario {
            TestScenario::new("teardown-on-failure", "teardown after failed body")
        }

        fn execute(&mut self, ctx: &TestContext) -> Result<()> {
            ctx.assert_that(false, "always fails")
        }

        fn teardown(&mut self, _ctx: &TestContext) -> Result<()> {
            *self.torn_down.lock() = true;
            Ok(())
        }
    }

    #[test]
    fn passing_case_reports_metrics() {
        let result = executor().run_case(Box::new(PassingCase));
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.metrics.custom.get("answer"), Some(&42.0));
        assert_eq!(result.metrics.error_count, 0);
        assert!(result.finished_at.is_some());
    }

    #[test]
    fn failed_assertion_fails_and_counts() {
        let result = executor().run_case(Box::new(FailingCase));
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.metrics.error_count, 1);
        let message = result.error_message.expect("error message");
        assert!(message.contains("one exceeds two"), "got: {message}");
    }

    #[test]
    fn panic_becomes_failed_not_abort() {
        let result = executor().run_case(Box::new(PanickingCase));
        assert_eq!(result.status, TestStatus::Failed);
        assert!(
            result.error_message.expect("message").contains("panicked"),
            "panic should surface generically"
        );
    }

    #[test]
    fn hang_times_out_near_deadline() {
        let start = Instant::now();
        let result = executor().run_case(Box::new(HangingCase));
        let elapsed = start.elapsed();
        assert_eq!(result.status, TestStatus::Timeout);
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
        assert!(result.error_message.expect("message").contains("HTK-3002"));
    }

    #[test]
    fn restricted_case_skips_without_setup() {
        let setup_ran = Arc::new(Mutex::new(false));
        let result = executor().run_case(Box::new(RestrictedCase {
            setup_ran: Arc::clone(&setup_ran),
        }));
        assert_eq!(result.status, TestStatus::Skipped);
        assert!(!*setup_ran.lock(), "setup must not run on a skipped case");
    }

    #[test]
    fn teardown_runs_after_failed_body() {
        let torn_down = Arc::new(Mutex::new(false));
        let result = executor().run_case(Box::new(TeardownTrackingCase {
            torn_down: Arc::clone(&torn_down),
        }));
        assert_eq!(result.status, TestStatus::Failed);
        assert!(*torn_down.lock(), "teardown must run after a failed body");
    }

    #[test]
    fn registry_creates_by_name() {
        let mut registry = TestRegistry::new();
        registry.register("passing", || PassingCase);
        registry.register("failing", || FailingCase);
        assert_eq!(registry.names(), vec!["failing", "passing"]);
        assert!(registry.create("passing").is_ok());
        let err = registry.create("absent").expect_err("unknown name");
        assert_eq!(err.code(), "HTK-3004");
    }

    #[test]
    fn suite_runner_tallies_and_reports() {
        let mut registry = TestRegistry::new();
        registry.register("a_passing", || PassingCase);
        registry.register("b_failing", || FailingCase);
        let runner = SuiteRunner::new(executor(), registry);

        let results = runner.run_all();
        let totals = SuiteRunner::totals(&results);
        assert_eq!(totals.passed, 1);
        assert_eq!(totals.failed, 1);
        assert!(!totals.all_green());

        let report = runner.generate_report(&results);
        assert!(report.contains("2 total"));
        assert!(report.contains("a_passing"));
        assert!(report.contains("answer = 42"));
    }

    #[test]
    fn suite_runner_appends_event_log_entries() {
        use crate::logger::jsonl::JsonlConfig;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.jsonl");
        let mut registry = TestRegistry::new();
        registry.register("passing", || PassingCase);
        registry.register("failing", || FailingCase);
        let runner = SuiteRunner::new(executor(), registry).with_event_log(JsonlWriter::open(
            &JsonlConfig {
                path: Some(path.clone()),
                stderr_fallback: false,
            },
        ));

        let results = runner.run_all();
        assert_eq!(results.len(), 2);
        drop(runner);

        let raw = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(raw.contains("test_passed"));
        assert!(raw.contains("test_failed"));
    }

    #[test]
    fn run_matching_filters_by_regex() {
        let mut registry = TestRegistry::new();
        registry.register("memory_read", || PassingCase);
        registry.register("memory_write", || PassingCase);
        registry.register("gpu_draw", || PassingCase);
        let runner = SuiteRunner::new(executor(), registry);

        let results = runner.run_matching("^memory_").expect("valid pattern");
        assert_eq!(results.len(), 2);

        let err = runner.run_matching("[invalid").expect_err("bad regex");
        assert_eq!(err.code(), "HTK-3005");
    }

    #[test]
    fn wait_for_polls_until_condition() {
        let ctx = TestContext::new(PlatformKind::Linux, Arc::new(DriverCoordinator::new()));
        let flag = Arc::new(Mutex::new(false));
        let flag_clone = Arc::clone(&flag);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            *flag_clone.lock() = true;
        });
        ctx.wait_for(|| *flag.lock(), Duration::from_secs(2))
            .expect("condition should be met");

        let never = ctx.wait_for(|| false, Duration::from_millis(30));
        assert!(never.is_err());
    }
}
