//! Per-method behavior descriptors: failure injection, simulated latency,
//! simulated resource consumption.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DriverError, ErrorCategory};

/// Predicate over the 1-indexed call count.
pub type FailurePredicate = Arc<dyn Fn(u32) -> bool + Send + Sync>;
/// Call-count → simulated latency.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;
/// Call-count → resource cost in abstract units.
pub type ResourceFn = Arc<dyn Fn(u32) -> u64 + Send + Sync>;

/// When a configured method should fail.
#[derive(Clone, Default)]
pub enum FailureMode {
    /// Never fail.
    #[default]
    Never,
    /// Fail every call.
    Always,
    /// Fail with the given percentage (0.0..=100.0) per call.
    RandomPercent(f64),
    /// Succeed for the first `n` calls, fail afterwards.
    AfterNCalls(u32),
    /// Fail exactly on call number `n` (1-indexed).
    OnSpecificCall(u32),
    /// Cycle through the boolean pattern; `true` entries fail.
    Pattern(Vec<bool>),
    /// Arbitrary predicate over the call count.
    Custom(FailurePredicate),
}

impl fmt::Debug for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("Never"),
            Self::Always => f.write_str("Always"),
            Self::RandomPercent(rate) => write!(f, "RandomPercent({rate})"),
            Self::AfterNCalls(n) => write!(f, "AfterNCalls({n})"),
            Self::OnSpecificCall(n) => write!(f, "OnSpecificCall({n})"),
            Self::Pattern(pattern) => write!(f, "Pattern({pattern:?})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How long a configured method should appear to take.
#[derive(Clone, Default)]
pub enum DelayMode {
    /// No simulated latency.
    #[default]
    Instant,
    /// Fixed latency per call.
    Fixed(Duration),
    /// Uniform latency in `[min, max]`.
    Random { min: Duration, max: Duration },
    /// Heuristic latency keyed on method-name substrings.
    Realistic,
    /// Arbitrary latency function over the call count.
    Custom(DelayFn),
}

impl fmt::Debug for DelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant => f.write_str("Instant"),
            Self::Fixed(d) => write!(f, "Fixed({d:?})"),
            Self::Random { min, max } => write!(f, "Random({min:?}..{max:?})"),
            Self::Realistic => f.write_str("Realistic"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How much of a finite simulated pool a method consumes.
#[derive(Clone, Default)]
pub enum ResourceMode {
    /// No accounting at all.
    #[default]
    Unlimited,
    /// Finite pool; each call costs `per_call` units.
    Limited { max: u64, per_call: u64 },
    /// Same accounting as `Limited`, semantically a depleting pool the test
    /// is expected to exhaust.
    Exhaustible { max: u64, per_call: u64 },
    /// Arbitrary cost function over the call count, with a pool cap.
    Custom { max: u64, cost: ResourceFn },
}

impl fmt::Debug for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("Unlimited"),
            Self::Limited { max, per_call } => write!(f, "Limited(max={max}, per_call={per_call})"),
            Self::Exhaustible { max, per_call } => {
                write!(f, "Exhaustible(max={max}, per_call={per_call})")
            }
            Self::Custom { max, .. } => write!(f, "Custom(max={max})"),
        }
    }
}

impl ResourceMode {
    /// Pool capacity, if this mode has one.
    #[must_use]
    pub const fn capacity(&self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Limited { max, .. } | Self::Exhaustible { max, .. } | Self::Custom { max, .. } => {
                Some(*max)
            }
        }
    }
}

/// Template for the error produced when a configured failure triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTemplate {
    pub category: ErrorCategory,
    pub code: u32,
    pub message: String,
    pub context: Option<String>,
}

impl Default for ErrorTemplate {
    fn default() -> Self {
        Self {
            category: ErrorCategory::Internal,
            code: 1,
            message: "injected fault".to_string(),
            context: None,
        }
    }
}

impl ErrorTemplate {
    #[must_use]
    pub fn new(category: ErrorCategory, code: u32, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Materialize the template into a concrete driver error.
    #[must_use]
    pub fn materialize(&self) -> DriverError {
        let mut error = DriverError::new(self.category, self.code, self.message.clone());
        if let Some(context) = &self.context {
            error = error.with_context(context.clone());
        }
        error
    }
}

/// Complete behavior description for one method name.
#[derive(Debug, Clone, Default)]
pub struct MethodBehavior {
    pub failure: FailureMode,
    pub delay: DelayMode,
    pub resources: ResourceMode,
    pub error: ErrorTemplate,
}

impl MethodBehavior {
    /// Succeed for `n` calls, then fail with a resource-exhaustion error.
    #[must_use]
    pub fn fail_after_calls(n: u32) -> Self {
        Self {
            failure: FailureMode::AfterNCalls(n),
            error: ErrorTemplate::new(
                ErrorCategory::Resource,
                1,
                "resource exhausted after repeated calls",
            ),
            ..Self::default()
        }
    }

    /// Fail with the given percentage per call, as a hardware fault.
    #[must_use]
    pub fn fail_randomly(percentage: f64) -> Self {
        Self {
            failure: FailureMode::RandomPercent(percentage),
            error: ErrorTemplate::new(ErrorCategory::Hardware, 1, "random hardware fault"),
            ..Self::default()
        }
    }

    /// Fail exactly once, on call number `n`.
    #[must_use]
    pub fn fail_on_call(n: u32) -> Self {
        Self {
            failure: FailureMode::OnSpecificCall(n),
            error: ErrorTemplate::new(ErrorCategory::Internal, 1, "scripted single-call fault"),
            ..Self::default()
        }
    }

    /// Fail on every call.
    #[must_use]
    pub fn always_fail(template: ErrorTemplate) -> Self {
        Self {
            failure: FailureMode::Always,
            error: template,
            ..Self::default()
        }
    }

    /// Constant simulated latency.
    #[must_use]
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            delay: DelayMode::Fixed(delay),
            ..Self::default()
        }
    }

    /// Uniform simulated latency in `[min, max]`.
    #[must_use]
    pub fn random_delay(min: Duration, max: Duration) -> Self {
        Self {
            delay: DelayMode::Random { min, max },
            ..Self::default()
        }
    }

    /// Latency heuristic matching typical hardware costs per operation kind.
    #[must_use]
    pub fn realistic_hardware() -> Self {
        Self {
            delay: DelayMode::Realistic,
            ..Self::default()
        }
    }

    /// Finite resource pool consumed per call.
    #[must_use]
    pub fn limited_resources(max: u64, per_call: u64) -> Self {
        Self {
            resources: ResourceMode::Limited { max, per_call },
            ..Self::default()
        }
    }

    /// Override the error produced when this behavior's failure triggers.
    #[must_use]
    pub fn with_error(mut self, template: ErrorTemplate) -> Self {
        self.error = template;
        self
    }

    /// Override the delay descriptor, keeping failure/resource settings.
    #[must_use]
    pub fn with_delay(mut self, delay: DelayMode) -> Self {
        self.delay = delay;
        self
    }

    /// Override the resource descriptor, keeping failure/delay settings.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceMode) -> Self {
        self.resources = resources;
        self
    }
}

/// Heuristic hardware latency keyed on method-name substrings.
///
/// The table reflects rough costs of real driver operations: allocation is
/// cheap, draw submission is not, present blocks for a 60 Hz frame.
#[must_use]
pub fn realistic_timing(method: &str) -> Duration {
    if method.contains("allocate") {
        Duration::from_micros(10)
    } else if method.contains("texture") {
        Duration::from_micros(100)
    } else if method.contains("buffer") {
        Duration::from_micros(50)
    } else if method.contains("draw") {
        Duration::from_micros(200)
    } else if method.contains("present") {
        Duration::from_micros(16_667)
    } else if method.contains("file") {
        Duration::from_micros(1_000)
    } else if method.contains("network") {
        Duration::from_micros(5_000)
    } else {
        Duration::from_micros(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_behavior_is_inert() {
        let behavior = MethodBehavior::default();
        assert!(matches!(behavior.failure, FailureMode::Never));
        assert!(matches!(behavior.delay, DelayMode::Instant));
        assert!(matches!(behavior.resources, ResourceMode::Unlimited));
    }

    #[test]
    fn presets_set_matching_error_categories() {
        let exhausted = MethodBehavior::fail_after_calls(3);
        assert_eq!(exhausted.error.category, ErrorCategory::Resource);

        let flaky = MethodBehavior::fail_randomly(25.0);
        assert_eq!(flaky.error.category, ErrorCategory::Hardware);
    }

    #[test]
    fn with_error_replaces_template() {
        let behavior = MethodBehavior::fail_after_calls(1)
            .with_error(ErrorTemplate::new(ErrorCategory::Network, 9, "link down"));
        let error = behavior.error.materialize();
        assert_eq!(error.category, ErrorCategory::Network);
        assert_eq!(error.code, 9);
        assert_eq!(error.message, "link down");
    }

    #[test]
    fn template_context_survives_materialization() {
        let mut template = ErrorTemplate::new(ErrorCategory::Validation, 2, "bad size");
        template.context = Some("allocate_buffer".to_string());
        let error = template.materialize();
        assert_eq!(error.context.as_deref(), Some("allocate_buffer"));
    }

    #[test]
    fn realistic_timing_matches_operation_kind() {
        assert_eq!(realistic_timing("allocate_block"), Duration::from_micros(10));
        assert_eq!(realistic_timing("upload_texture"), Duration::from_micros(100));
        assert_eq!(realistic_timing("map_buffer"), Duration::from_micros(50));
        assert_eq!(realistic_timing("draw_indexed"), Duration::from_micros(200));
        assert_eq!(realistic_timing("present_frame"), Duration::from_micros(16_667));
        assert_eq!(realistic_timing("file_read"), Duration::from_micros(1_000));
        assert_eq!(realistic_timing("network_send"), Duration::from_micros(5_000));
        assert_eq!(realistic_timing("query_caps"), Duration::from_micros(1));
    }

    #[test]
    fn resource_capacity_reported_per_mode() {
        assert_eq!(ResourceMode::Unlimited.capacity(), None);
        assert_eq!(
            ResourceMode::Limited {
                max: 64,
                per_call: 4
            }
            .capacity(),
            Some(64)
        );
        assert_eq!(
            ResourceMode::Exhaustible {
                max: 8,
                per_call: 1
            }
            .capacity(),
            Some(8)
        );
    }
}
