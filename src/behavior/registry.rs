//! Behavior registry: per-method descriptors, call counters, resource
//! accounting, and seeded failure draws.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::behavior::config::{
    DelayMode, FailureMode, MethodBehavior, ResourceMode, realistic_timing,
};
use crate::core::errors::DriverError;

/// Shared behavior state for one mocked driver.
///
/// Counters are the source of truth for the `call_count` passed into the
/// evaluators: callers increment first, so count-based failure modes are
/// 1-indexed against completed attempts. Probabilistic draws come from a
/// per-method RNG stream derived from one base seed, so injection for a given
/// method replays identically regardless of how other methods interleave.
#[derive(Debug)]
pub struct BehaviorRegistry {
    base_seed: u64,
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    methods: HashMap<String, MethodBehavior>,
    default: MethodBehavior,
    call_counts: HashMap<String, u32>,
    resource_usage: HashMap<String, u64>,
    rngs: HashMap<String, StdRng>,
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorRegistry {
    /// Registry with failure draws seeded from entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Registry with a fixed base seed for reproducible failure injection.
    #[must_use]
    pub fn with_seed(base_seed: u64) -> Self {
        Self {
            base_seed,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Override behavior for one method name.
    pub fn set_method_behavior(&self, method: impl Into<String>, behavior: MethodBehavior) {
        self.inner.lock().methods.insert(method.into(), behavior);
    }

    /// Behavior applied to any method without an explicit override.
    pub fn set_default_behavior(&self, behavior: MethodBehavior) {
        self.inner.lock().default = behavior;
    }

    /// Effective behavior for a method: the override, or the default.
    #[must_use]
    pub fn behavior_for(&self, method: &str) -> MethodBehavior {
        let inner = self.inner.lock();
        inner
            .methods
            .get(method)
            .unwrap_or(&inner.default)
            .clone()
    }

    /// Bump and return the method's call counter.
    pub fn increment_call_count(&self, method: &str) -> u32 {
        let mut inner = self.inner.lock();
        let count = inner.call_counts.entry(method.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Completed-attempt counter for a method.
    #[must_use]
    pub fn call_count(&self, method: &str) -> u32 {
        self.inner.lock().call_counts.get(method).copied().unwrap_or(0)
    }

    /// Evaluate the failure descriptor for this call.
    #[must_use]
    pub fn should_fail(&self, method: &str, call_count: u32) -> bool {
        let behavior = self.behavior_for(method);
        match behavior.failure {
            FailureMode::Never => false,
            FailureMode::Always => true,
            FailureMode::RandomPercent(rate) => {
                let draw: f64 = self.with_method_rng(method, |rng| rng.random_range(0.0..100.0));
                draw < rate
            }
            FailureMode::AfterNCalls(n) => call_count > n,
            FailureMode::OnSpecificCall(n) => call_count == n,
            FailureMode::Pattern(pattern) => {
                if pattern.is_empty() {
                    false
                } else {
                    pattern[(call_count.saturating_sub(1) as usize) % pattern.len()]
                }
            }
            FailureMode::Custom(predicate) => predicate(call_count),
        }
    }

    /// Evaluate the performance descriptor for this call.
    #[must_use]
    pub fn delay_for(&self, method: &str, call_count: u32) -> Duration {
        let behavior = self.behavior_for(method);
        match behavior.delay {
            DelayMode::Instant => Duration::ZERO,
            DelayMode::Fixed(delay) => delay,
            DelayMode::Random { min, max } => {
                if max <= min {
                    min
                } else {
                    let lo = duration_to_micros(min);
                    let hi = duration_to_micros(max);
                    let micros = self.with_method_rng(method, |rng| rng.random_range(lo..=hi));
                    Duration::from_micros(micros)
                }
            }
            DelayMode::Realistic => realistic_timing(method),
            DelayMode::Custom(delay_fn) => delay_fn(call_count),
        }
    }

    /// Declared resource cost for this call, in abstract units.
    #[must_use]
    pub fn resource_cost(&self, method: &str, call_count: u32) -> u64 {
        let behavior = self.behavior_for(method);
        match behavior.resources {
            ResourceMode::Unlimited => 0,
            ResourceMode::Limited { per_call, .. } | ResourceMode::Exhaustible { per_call, .. } => {
                per_call
            }
            ResourceMode::Custom { cost, .. } => cost(call_count),
        }
    }

    /// Whether `requested` units fit in the method's remaining pool.
    #[must_use]
    pub fn has_resources(&self, method: &str, requested: u64) -> bool {
        let behavior = self.behavior_for(method);
        let Some(max) = behavior.resources.capacity() else {
            // Unlimited fast path: no bookkeeping.
            return true;
        };
        let inner = self.inner.lock();
        let used = inner.resource_usage.get(method).copied().unwrap_or(0);
        used.saturating_add(requested) <= max
    }

    /// Consume pool units, rejecting the request if it would overrun the cap.
    ///
    /// Check-then-consume: a rejected request leaves the counter untouched.
    pub fn consume_resources(&self, method: &str, amount: u64) -> Result<(), DriverError> {
        let behavior = self.behavior_for(method);
        let Some(max) = behavior.resources.capacity() else {
            return Ok(());
        };
        let mut inner = self.inner.lock();
        let used = inner.resource_usage.entry(method.to_string()).or_insert(0);
        let requested = used.saturating_add(amount);
        if requested > max {
            return Err(DriverError::resource_exhausted(
                1,
                format!("simulated pool for '{method}' exhausted: {used}+{amount} > {max}"),
            ));
        }
        *used = requested;
        Ok(())
    }

    /// Return pool units; the counter saturates at zero.
    pub fn release_resources(&self, method: &str, amount: u64) {
        let mut inner = self.inner.lock();
        if let Some(used) = inner.resource_usage.get_mut(method) {
            *used = used.saturating_sub(amount);
        }
    }

    /// Current consumed units for a method's pool.
    #[must_use]
    pub fn resource_usage(&self, method: &str) -> u64 {
        self.inner.lock().resource_usage.get(method).copied().unwrap_or(0)
    }

    /// Materialize the configured error template for a method.
    #[must_use]
    pub fn error_for(&self, method: &str) -> DriverError {
        self.behavior_for(method).error.materialize()
    }

    /// Clear all counters, pools, and RNG streams; configured behaviors stay.
    ///
    /// RNG streams re-derive from the base seed, so a seeded registry replays
    /// the same draw sequence after a reset.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.call_counts.clear();
        inner.resource_usage.clear();
        inner.rngs.clear();
    }

    fn with_method_rng<T>(&self, method: &str, draw: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut inner = self.inner.lock();
        let base_seed = self.base_seed;
        let rng = inner
            .rngs
            .entry(method.to_string())
            .or_insert_with(|| StdRng::seed_from_u64(method_stream_seed(base_seed, method)));
        draw(rng)
    }
}

fn method_stream_seed(base_seed: u64, method: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    method.hash(&mut hasher);
    base_seed ^ hasher.finish()
}

#[allow(clippy::cast_possible_truncation)]
fn duration_to_micros(duration: Duration) -> u64 {
    duration.as_micros().min(u128::from(u64::MAX)) as u64
}
