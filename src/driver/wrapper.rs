//! The mock-driver funnel: every operation runs through one behavior gate.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::behavior::registry::BehaviorRegistry;
use crate::core::errors::DriverError;
use crate::driver::capability::{Capability, DriverProfile, PerformanceTier};
use crate::tracker::state::StateTracker;
use crate::tracker::value::Value;

/// Lifecycle states of a mocked driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initialized,
    Shutdown,
}

impl DriverState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Capability seam for a concrete mock backend.
///
/// A backend carries whatever simulated state its driver needs; the wrapper
/// never inspects it beyond this trait.
pub trait DriverBackend: Send {
    /// Human-readable driver name, used in transitions and reports.
    fn name(&self) -> &str;

    /// Static descriptor the wrapper reports to capability queries.
    fn profile(&self) -> DriverProfile;

    /// Default success value for operations with no backend logic.
    fn default_return(&self) -> Value {
        Value::Unit
    }
}

/// Mock driver composing injected behavior, recording, and a backend.
///
/// Every operation, lifecycle included, goes through [`MockDriver::run_method`]
/// so that counting, failure injection, delays, resource accounting, and call
/// recording happen in one fixed order. Each invocation commits exactly one
/// tracker record regardless of which gate stops it.
pub struct MockDriver<B> {
    backend: Mutex<B>,
    registry: Arc<BehaviorRegistry>,
    tracker: Arc<StateTracker>,
    state: Mutex<DriverState>,
}

impl<B: DriverBackend> MockDriver<B> {
    /// Driver with entropy-seeded behavior injection.
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, Arc::new(BehaviorRegistry::new()))
    }

    /// Driver sharing an externally-configured behavior registry.
    pub fn with_registry(backend: B, registry: Arc<BehaviorRegistry>) -> Self {
        Self {
            backend: Mutex::new(backend),
            registry,
            tracker: Arc::new(StateTracker::new()),
            state: Mutex::new(DriverState::Uninitialized),
        }
    }

    /// Behavior registry driving this driver's injection.
    #[must_use]
    pub fn registry(&self) -> Arc<BehaviorRegistry> {
        Arc::clone(&self.registry)
    }

    /// Recorder observing this driver's activity.
    #[must_use]
    pub fn tracker(&self) -> Arc<StateTracker> {
        Arc::clone(&self.tracker)
    }

    /// Static descriptor from the backend.
    #[must_use]
    pub fn profile(&self) -> DriverProfile {
        self.backend.lock().profile()
    }

    /// Whether the backend advertises a capability.
    #[must_use]
    pub fn supports(&self, cap: Capability) -> bool {
        self.profile().supports(cap)
    }

    /// Raw capability bitmask.
    #[must_use]
    pub fn capability_mask(&self) -> u32 {
        self.profile().capability_mask
    }

    /// Decoded capability list.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.profile().capabilities()
    }

    /// Advertised performance class.
    #[must_use]
    pub fn tier(&self) -> PerformanceTier {
        self.profile().tier
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        *self.state.lock()
    }

    /// Whether the driver is initialized and not shut down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == DriverState::Initialized
    }

    /// Funnel one operation through the behavior gate.
    ///
    /// Gate order: increment count, resource availability (fail fast, no
    /// delay, no body), configured failure, simulated delay, resource consume,
    /// then the backend body. `params` are recorded on every path.
    pub fn run_method(
        &self,
        method: &str,
        params: Vec<(String, Value)>,
        body: impl FnOnce(&mut B) -> Result<Value, DriverError>,
    ) -> Result<Value, DriverError> {
        let count = self.registry.increment_call_count(method);
        let mut scope = self.tracker.begin_call(method);
        for (name, value) in params {
            scope.arg(name, value);
        }

        let cost = self.registry.resource_cost(method, count);
        if cost > 0 && !self.registry.has_resources(method, cost) {
            let error = DriverError::resource_exhausted(
                1,
                format!("simulated pool for '{method}' exhausted"),
            );
            scope.fail(error.to_string());
            return Err(error);
        }

        if self.registry.should_fail(method, count) {
            let error = self.registry.error_for(method);
            scope.fail(error.to_string());
            return Err(error);
        }

        let delay = self.registry.delay_for(method, count);
        if delay > Duration::ZERO {
            thread::sleep(delay);
        }

        if cost > 0
            && let Err(error) = self.registry.consume_resources(method, cost)
        {
            scope.fail(error.to_string());
            return Err(error);
        }

        match body(&mut self.backend.lock()) {
            Ok(value) => {
                scope.succeed(value.clone());
                Ok(value)
            }
            Err(error) => {
                scope.fail(error.to_string());
                Err(error)
            }
        }
    }

    /// Funnel a pure-mock operation: no backend logic, default return value.
    pub fn run_mock_method(
        &self,
        method: &str,
        params: Vec<(String, Value)>,
    ) -> Result<Value, DriverError> {
        self.run_method(method, params, |backend| Ok(backend.default_return()))
    }

    /// Bring the driver up, recording the `driver_state` transition.
    pub fn initialize(&self) -> Result<(), DriverError> {
        let current = self.state();
        if current != DriverState::Uninitialized {
            return Err(DriverError::invalid_state(
                1,
                format!("initialize from state '{}'", current.as_str()),
            ));
        }
        self.run_method("initialize", Vec::new(), |_| Ok(Value::Unit))?;
        *self.state.lock() = DriverState::Initialized;
        self.tracker.record_transition(
            "driver_state",
            current.as_str(),
            DriverState::Initialized.as_str(),
            Some("initialize".to_string()),
        );
        Ok(())
    }

    /// Shut the driver down. Shutting down a never-initialized driver is a
    /// state error.
    pub fn shutdown(&self) -> Result<(), DriverError> {
        let current = self.state();
        if current != DriverState::Initialized {
            return Err(DriverError::invalid_state(
                2,
                format!("shutdown from state '{}'", current.as_str()),
            ));
        }
        self.run_method("shutdown", Vec::new(), |_| Ok(Value::Unit))?;
        *self.state.lock() = DriverState::Shutdown;
        self.tracker.record_transition(
            "driver_state",
            current.as_str(),
            DriverState::Shutdown.as_str(),
            Some("shutdown".to_string()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::config::{ErrorTemplate, MethodBehavior};
    use crate::core::errors::ErrorCategory;

    struct NullBackend;

    impl DriverBackend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }

        fn profile(&self) -> DriverProfile {
            DriverProfile::new(
                "null",
                PerformanceTier::Minimal,
                &[Capability::Statistics],
            )
        }
    }

    fn driver() -> MockDriver<NullBackend> {
        MockDriver::with_registry(NullBackend, Arc::new(BehaviorRegistry::with_seed(1)))
    }

    #[test]
    fn always_fail_skips_backend_but_counts_and_records() {
        let driver = driver();
        let registry = driver.registry();
        registry.set_method_behavior(
            "ping",
            MethodBehavior::always_fail(ErrorTemplate::new(ErrorCategory::Hardware, 3, "dead")),
        );

        let mut backend_ran = false;
        let err = driver
            .run_method("ping", Vec::new(), |_| {
                backend_ran = true;
                Ok(Value::Unit)
            })
            .expect_err("must fail");
        assert!(!backend_ran, "backend must not run under Always");
        assert_eq!(err.category, ErrorCategory::Hardware);
        assert_eq!(registry.call_count("ping"), 1);

        let tracker = driver.tracker();
        assert_eq!(tracker.call_count("ping"), 1);
        assert!(!tracker.calls_for("ping")[0].success);
    }

    #[test]
    fn after_n_calls_gate_matches_boundary() {
        let driver = driver();
        driver
            .registry()
            .set_method_behavior("op", MethodBehavior::fail_after_calls(3));
        for n in 1..=5 {
            let result = driver.run_mock_method("op", Vec::new());
            if n <= 3 {
                assert!(result.is_ok(), "call {n} should succeed");
            } else {
                let err = result.expect_err("past the boundary must fail");
                assert_eq!(err.category, ErrorCategory::Resource);
            }
        }
        assert_eq!(driver.registry().call_count("op"), 5);
    }

    #[test]
    fn exhausted_pool_fails_fast_without_consuming() {
        let driver = driver();
        let registry = driver.registry();
        registry.set_method_behavior("grab", MethodBehavior::limited_resources(4, 2));

        driver.run_mock_method("grab", Vec::new()).expect("call 1");
        driver.run_mock_method("grab", Vec::new()).expect("call 2");
        assert_eq!(registry.resource_usage("grab"), 4);

        let err = driver
            .run_mock_method("grab", Vec::new())
            .expect_err("pool exhausted");
        assert_eq!(err.category, ErrorCategory::Resource);
        assert_eq!(registry.resource_usage("grab"), 4, "rejection must not consume");

        registry.release_resources("grab", 2);
        driver.run_mock_method("grab", Vec::new()).expect("after release");
    }

    #[test]
    fn params_recorded_on_failure_paths_too() {
        let driver = driver();
        driver.registry().set_method_behavior(
            "write",
            MethodBehavior::always_fail(ErrorTemplate::default()),
        );
        let _ = driver.run_mock_method(
            "write",
            vec![("id".to_string(), Value::from(5u64))],
        );
        assert!(driver.tracker().was_called_with("write", &[Value::from(5u64)]));
    }

    #[test]
    fn lifecycle_transitions_are_recorded() {
        let driver = driver();
        assert!(!driver.is_active());
        driver.initialize().expect("initialize");
        assert!(driver.is_active());
        driver.shutdown().expect("shutdown");
        assert!(!driver.is_active());

        let tracker = driver.tracker();
        assert!(tracker.verify_call_sequence(&["initialize", "shutdown"]));
        assert_eq!(tracker.current_state("driver_state").as_deref(), Some("shutdown"));
        let transitions = tracker.transitions();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].from, "uninitialized");
        assert_eq!(transitions[0].to, "initialized");
    }

    #[test]
    fn shutdown_before_initialize_is_a_state_error() {
        let driver = driver();
        let err = driver.shutdown().expect_err("must reject");
        assert_eq!(err.category, ErrorCategory::Validation);
        // The guard rejects before the funnel: no call recorded.
        assert_eq!(driver.tracker().total_call_count(), 0);
    }

    #[test]
    fn double_initialize_is_rejected() {
        let driver = driver();
        driver.initialize().expect("first");
        let err = driver.initialize().expect_err("second must fail");
        assert_eq!(err.category, ErrorCategory::Validation);
    }

    #[test]
    fn fixed_delay_is_observable() {
        let driver = driver();
        driver.registry().set_method_behavior(
            "slow",
            MethodBehavior::fixed_delay(Duration::from_millis(20)),
        );
        let start = std::time::Instant::now();
        driver.run_mock_method("slow", Vec::new()).expect("ok");
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn capability_queries_delegate_to_backend() {
        let driver = driver();
        assert!(driver.supports(Capability::Statistics));
        assert!(!driver.supports(Capability::DmaTransfer));
        assert_eq!(driver.tier(), PerformanceTier::Minimal);
        assert_eq!(driver.capabilities(), vec![Capability::Statistics]);
    }
}
