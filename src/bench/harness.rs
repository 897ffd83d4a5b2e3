//! Platform-adaptive compliance and benchmark harness.

use std::fmt::Write as _;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::behavior::config::{DelayMode, ErrorTemplate, MethodBehavior};
use crate::behavior::registry::BehaviorRegistry;
use crate::bench::metrics::{BenchmarkResults, LatencyStats, Throughput};
use crate::core::config::SlaOverrides;
use crate::core::errors::{DriverError, ErrorCategory};
use crate::platform::profile::{PlatformKind, PlatformLimits};

/// Fault classes the harness can inject while benchmarking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorInjection {
    ResourceExhaustion,
    MemoryPressure,
    NetworkFailure,
    HardwareFailure,
    TimeoutFailure,
    InvalidParameter,
    ConcurrencyFailure,
}

impl ErrorInjection {
    /// Behavior this injection maps onto a registry's default.
    #[must_use]
    pub fn behavior(self) -> MethodBehavior {
        match self {
            Self::ResourceExhaustion => MethodBehavior::fail_after_calls(0).with_error(
                ErrorTemplate::new(ErrorCategory::Resource, 1, "injected resource exhaustion"),
            ),
            Self::MemoryPressure => MethodBehavior::fail_randomly(25.0).with_error(
                ErrorTemplate::new(ErrorCategory::Resource, 2, "injected memory pressure"),
            ),
            Self::NetworkFailure => MethodBehavior::always_fail(ErrorTemplate::new(
                ErrorCategory::Network,
                1,
                "injected network failure",
            )),
            Self::HardwareFailure => MethodBehavior::fail_randomly(50.0).with_error(
                ErrorTemplate::new(ErrorCategory::Hardware, 1, "injected hardware failure"),
            ),
            Self::TimeoutFailure => MethodBehavior::fail_randomly(50.0)
                .with_delay(DelayMode::Fixed(Duration::from_millis(100)))
                .with_error(ErrorTemplate::new(
                    ErrorCategory::Network,
                    2,
                    "injected operation timeout",
                )),
            Self::InvalidParameter => MethodBehavior::always_fail(ErrorTemplate::new(
                ErrorCategory::Configuration,
                1,
                "injected invalid parameter",
            )),
            Self::ConcurrencyFailure => MethodBehavior::fail_randomly(10.0).with_error(
                ErrorTemplate::new(ErrorCategory::Internal, 2, "injected concurrency fault"),
            ),
        }
    }
}

/// Per-worker outcome of a stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker: usize,
    pub iterations: usize,
    pub failures: usize,
    /// First failure observed by this worker, when any.
    pub first_error: Option<String>,
}

/// Aggregated stress-test outcome across every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressReport {
    pub workers: Vec<WorkerReport>,
    pub total_iterations: usize,
    pub total_failures: usize,
    pub elapsed: Duration,
}

impl StressReport {
    /// Workers that observed at least one failure.
    #[must_use]
    pub fn faulted_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.failures > 0).count()
    }
}

/// Measures a system under test against its platform's expectations.
pub struct ComplianceHarness {
    platform: PlatformKind,
    limits: PlatformLimits,
    injection: Mutex<Option<ErrorInjection>>,
}

impl ComplianceHarness {
    /// Harness using the platform's table limits as-is.
    #[must_use]
    pub fn new(platform: PlatformKind) -> Self {
        Self {
            platform,
            limits: platform.limits(),
            injection: Mutex::new(None),
        }
    }

    /// Harness with configured SLA overrides on top of the table.
    #[must_use]
    pub fn with_overrides(platform: PlatformKind, overrides: &SlaOverrides) -> Self {
        Self {
            platform,
            limits: platform.limits().with_overrides(overrides),
            injection: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn platform(&self) -> PlatformKind {
        self.platform
    }

    #[must_use]
    pub const fn limits(&self) -> &PlatformLimits {
        &self.limits
    }

    /// Whether an allocation of `bytes` fits the platform's memory budget.
    #[must_use]
    pub const fn allocation_within_budget(&self, bytes: u64) -> bool {
        bytes <= self.limits.max_allocation_bytes
    }

    /// Wall-clock duration of a single invocation.
    pub fn measure_latency<E>(
        &self,
        op: impl FnOnce() -> Result<(), E>,
    ) -> Result<Duration, E> {
        let start = Instant::now();
        op()?;
        Ok(start.elapsed())
    }

    /// Run `iterations` invocations, collecting per-op latency and overall
    /// throughput. `op` returns the bytes it processed; failed iterations
    /// count but contribute no latency sample.
    pub fn measure_throughput(
        &self,
        iterations: usize,
        mut op: impl FnMut(usize) -> Result<u64, DriverError>,
    ) -> BenchmarkResults {
        let mut samples = Vec::with_capacity(iterations);
        let mut failed = 0u64;
        let mut items = 0u64;
        let mut bytes = 0u64;

        let window = Instant::now();
        for i in 0..iterations {
            let start = Instant::now();
            match op(i) {
                Ok(processed) => {
                    samples.push(start.elapsed());
                    items += 1;
                    bytes += processed;
                }
                Err(_) => failed += 1,
            }
        }
        let elapsed = window.elapsed();

        let latency = LatencyStats::from_samples(samples);
        let throughput = Throughput::over(elapsed, iterations as u64, items, bytes);
        let sla_passed = latency.p95 <= self.limits.max_p95_latency
            && throughput.ops_per_sec >= self.limits.min_throughput_ops;

        BenchmarkResults {
            latency,
            throughput,
            total_ops: iterations as u64,
            failed_ops: failed,
            sla_passed,
        }
    }

    /// Hammer `op` from `workers` real threads, `iterations` each.
    ///
    /// Every worker's failures are captured, not just the first one to fault.
    pub fn run_stress_test<F>(&self, workers: usize, iterations: usize, op: F) -> StressReport
    where
        F: Fn(usize, usize) -> Result<(), DriverError> + Send + Sync,
    {
        let start = Instant::now();
        let reports = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let op = &op;
                    scope.spawn(move || {
                        let mut failures = 0usize;
                        let mut first_error = None;
                        for iteration in 0..iterations {
                            if let Err(error) = op(worker, iteration) {
                                failures += 1;
                                if first_error.is_none() {
                                    first_error = Some(error.to_string());
                                }
                            }
                        }
                        WorkerReport {
                            worker,
                            iterations,
                            failures,
                            first_error,
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| WorkerReport {
                        worker: usize::MAX,
                        iterations: 0,
                        failures: iterations,
                        first_error: Some("worker panicked".to_string()),
                    })
                })
                .collect::<Vec<_>>()
        });

        let total_failures = reports.iter().map(|r| r.failures).sum();
        StressReport {
            total_iterations: workers * iterations,
            total_failures,
            workers: reports,
            elapsed: start.elapsed(),
        }
    }

    /// Activate one fault class for subsequent runs.
    pub fn enable_error_injection(&self, kind: ErrorInjection) {
        *self.injection.lock() = Some(kind);
    }

    /// Deactivate fault injection.
    pub fn disable_error_injection(&self) {
        *self.injection.lock() = None;
    }

    /// The currently active fault class, if any.
    #[must_use]
    pub fn active_injection(&self) -> Option<ErrorInjection> {
        *self.injection.lock()
    }

    /// Push the active fault class onto a registry's default behavior.
    pub fn apply_injection(&self, registry: &BehaviorRegistry) {
        match self.active_injection() {
            Some(kind) => registry.set_default_behavior(kind.behavior()),
            None => registry.set_default_behavior(MethodBehavior::default()),
        }
    }

    /// Whether an operation outcome is acceptable right now.
    ///
    /// With injection active the system under test may legitimately fail, so
    /// both outcomes pass; without it, only success does.
    #[must_use]
    pub fn check_result<T, E>(&self, result: &Result<T, E>) -> bool {
        self.active_injection().is_some() || result.is_ok()
    }

    /// Text summary of one benchmark run against the limits.
    #[must_use]
    pub fn render_summary(&self, results: &BenchmarkResults) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Benchmark ({}) ===", self.platform);
        let _ = writeln!(
            out,
            "ops: {} total, {} failed",
            results.total_ops, results.failed_ops
        );
        let _ = writeln!(
            out,
            "latency: p95 {:?} (limit {:?}), p99 {:?}, mean {:?}",
            results.latency.p95, self.limits.max_p95_latency, results.latency.p99, results.latency.mean
        );
        let _ = writeln!(
            out,
            "throughput: {:.1} ops/s (floor {:.1})",
            results.throughput.ops_per_sec, self.limits.min_throughput_ops
        );
        let _ = writeln!(
            out,
            "SLA: {}",
            if results.sla_passed { "PASS" } else { "FAIL" }
        );
        out
    }
}
