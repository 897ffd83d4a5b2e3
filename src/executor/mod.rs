//! Timeout-bounded test execution and suite reporting.

pub mod result;
pub mod runner;

pub use result::{TestMetrics, TestResult, TestScenario, TestStatus};
pub use runner::{SuiteRunner, SuiteTotals, TestCase, TestContext, TestExecutor, TestRegistry};
