//! Failure, latency, and resource behavior injection for mocked drivers.

pub mod config;
pub mod registry;

pub use config::{
    DelayMode, ErrorTemplate, FailureMode, MethodBehavior, ResourceMode, realistic_timing,
};
pub use registry::BehaviorRegistry;
