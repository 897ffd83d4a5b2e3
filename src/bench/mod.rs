//! Compliance benchmarking: latency/throughput statistics and stress runs.

pub mod harness;
pub mod metrics;

pub use harness::{ComplianceHarness, ErrorInjection, StressReport, WorkerReport};
pub use metrics::{BenchmarkResults, LatencyStats, Throughput};
