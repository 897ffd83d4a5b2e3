//! Convenience re-exports for harness consumers.
//!
//! ```rust,no_run
//! use hal_testkit::prelude::*;
//! ```

// Core
pub use crate::core::config::HarnessConfig;
pub use crate::core::errors::{DriverError, ErrorCategory, Result, TestkitError};

// Behavior
pub use crate::behavior::config::{
    DelayMode, ErrorTemplate, FailureMode, MethodBehavior, ResourceMode,
};
pub use crate::behavior::registry::BehaviorRegistry;

// Tracker
pub use crate::tracker::state::{ResourceEventKind, StateTracker, TrackerStatistics};
pub use crate::tracker::value::{FromValue, Value};

// Driver
pub use crate::driver::capability::{Capability, DriverProfile, PerformanceTier};
pub use crate::driver::memory::MemoryDriver;
pub use crate::driver::wrapper::{DriverBackend, DriverState, MockDriver};

// Platform
pub use crate::platform::profile::{PlatformKind, PlatformLimits};

// Coordinator
pub use crate::coordinator::{DriverCoordinator, LoopbackBus, MessageBus, MessageHandler};

// Executor
pub use crate::executor::result::{TestResult, TestScenario, TestStatus};
pub use crate::executor::runner::{
    SuiteRunner, TestCase, TestContext, TestExecutor, TestRegistry,
};

// Bench
pub use crate::bench::harness::{ComplianceHarness, ErrorInjection, StressReport};
pub use crate::bench::metrics::{BenchmarkResults, LatencyStats, Throughput};
