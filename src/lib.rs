#![forbid(unsafe_code)]

//! HAL Testkit (htk) — behavior injection and verification for hardware
//! abstraction layer drivers.
//!
//! Three-pronged harness:
//! 1. **Behavior injection** — per-method failure, latency, and resource
//!    descriptors applied to mocked drivers
//! 2. **State tracking** — append-only call/resource/transition logs with
//!    typed parameter capture and verification queries
//! 3. **Adaptive harness** — timeout-bounded test execution and SLA
//!    benchmarking calibrated to the target platform
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use hal_testkit::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use hal_testkit::behavior::config::MethodBehavior;
//! use hal_testkit::executor::runner::{TestExecutor, TestRegistry};
//! ```

pub mod prelude;

pub mod behavior;
pub mod bench;
pub mod coordinator;
pub mod core;
pub mod driver;
pub mod executor;
pub mod logger;
pub mod platform;
pub mod tracker;
