//! Call, resource, and state-transition recording for mocked drivers.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TestkitError};
use crate::tracker::value::{FromValue, Value};

/// One completed method invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    /// Monotonic offset from tracker creation.
    pub offset: Duration,
    /// Wall-clock stamp for report output.
    pub recorded_at: DateTime<Utc>,
    pub params: Vec<(String, Value)>,
    pub return_value: Value,
    pub success: bool,
    pub error: Option<String>,
}

impl MethodCall {
    /// Parameter value by position.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index).map(|(_, value)| value)
    }

    /// Parameter value by name.
    #[must_use]
    pub fn param_named(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }

    /// Typed parameter recovery by position.
    pub fn param_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.param(index).ok_or_else(|| TestkitError::Runtime {
            details: format!("call '{}' has no parameter at index {index}", self.method),
        })?;
        value.try_as::<T>()
    }

    /// Typed return-value recovery.
    pub fn return_as<T: FromValue>(&self) -> Result<T> {
        self.return_value.try_as::<T>()
    }
}

/// What happened to a simulated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceEventKind {
    Created,
    Destroyed,
    Modified,
    Accessed,
}

/// One lifecycle event on a simulated resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: ResourceEventKind,
    pub id: u64,
    pub resource_type: String,
    pub offset: Duration,
    pub recorded_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub debug_name: Option<String>,
    pub metadata: Option<String>,
}

/// One transition of a named state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub machine: String,
    pub from: String,
    pub to: String,
    pub offset: Duration,
    pub recorded_at: DateTime<Utc>,
    /// Method that triggered the transition, when known.
    pub trigger: Option<String>,
    pub context: Option<String>,
}

/// Live view of a resource that has been created and not yet destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveResource {
    pub id: u64,
    pub resource_type: String,
    pub size_bytes: u64,
    pub debug_name: Option<String>,
}

/// Aggregate tracking figures, computed under one lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerStatistics {
    pub total_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub resources_created: usize,
    pub resources_destroyed: usize,
    pub active_resources: usize,
    pub state_transitions: usize,
    /// First-call to last-call span.
    pub tracking_span: Duration,
    /// Tracking span averaged over the total call count.
    pub mean_inter_call: Duration,
}

#[derive(Debug, Default)]
struct TrackerInner {
    calls: Vec<MethodCall>,
    events: Vec<ResourceEvent>,
    transitions: Vec<StateTransition>,
    method_counts: HashMap<String, u32>,
    active: HashMap<u64, ActiveResource>,
    current_states: HashMap<String, String>,
}

/// Append-only recorder for everything a mocked driver does.
///
/// Logs are kept in completion order. In-flight calls live inside a
/// [`CallScope`] guard and hit the shared log exactly once, when the guard
/// drops, so a panicking test body still leaves a committed record behind.
#[derive(Debug)]
pub struct StateTracker {
    epoch: Instant,
    inner: Mutex<TrackerInner>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    /// Open a scoped record for an in-flight call.
    #[must_use]
    pub fn begin_call(&self, method: impl Into<String>) -> CallScope<'_> {
        CallScope {
            tracker: self,
            record: Some(MethodCall {
                method: method.into(),
                offset: self.epoch.elapsed(),
                recorded_at: Utc::now(),
                params: Vec::new(),
                return_value: Value::Unit,
                success: true,
                error: None,
            }),
        }
    }

    /// Append an already-built record directly, bypassing the scoped idiom.
    pub fn record_call(&self, call: MethodCall) {
        self.commit(call);
    }

    fn commit(&self, call: MethodCall) {
        let mut inner = self.inner.lock();
        *inner.method_counts.entry(call.method.clone()).or_insert(0) += 1;
        inner.calls.push(call);
    }

    /// Record a resource lifecycle event and update the active-resources view.
    pub fn record_resource_event(
        &self,
        kind: ResourceEventKind,
        id: u64,
        resource_type: impl Into<String>,
        size_bytes: u64,
    ) {
        self.record_resource_event_full(kind, id, resource_type, size_bytes, None, None);
    }

    /// Resource event with optional debug name and metadata.
    pub fn record_resource_event_full(
        &self,
        kind: ResourceEventKind,
        id: u64,
        resource_type: impl Into<String>,
        size_bytes: u64,
        debug_name: Option<String>,
        metadata: Option<String>,
    ) {
        let resource_type = resource_type.into();
        let event = ResourceEvent {
            kind,
            id,
            resource_type: resource_type.clone(),
            offset: self.epoch.elapsed(),
            recorded_at: Utc::now(),
            size_bytes,
            debug_name: debug_name.clone(),
            metadata,
        };
        let mut inner = self.inner.lock();
        match kind {
            ResourceEventKind::Created => {
                inner.active.insert(
                    id,
                    ActiveResource {
                        id,
                        resource_type,
                        size_bytes,
                        debug_name,
                    },
                );
            }
            ResourceEventKind::Destroyed => {
                inner.active.remove(&id);
            }
            ResourceEventKind::Modified | ResourceEventKind::Accessed => {}
        }
        inner.events.push(event);
    }

    /// Record a state-machine transition and update the current-state map.
    pub fn record_transition(
        &self,
        machine: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        trigger: Option<String>,
    ) {
        self.record_transition_full(machine, from, to, trigger, None);
    }

    /// Transition with free-form context attached.
    pub fn record_transition_full(
        &self,
        machine: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        trigger: Option<String>,
        context: Option<String>,
    ) {
        let machine = machine.into();
        let to = to.into();
        let transition = StateTransition {
            machine: machine.clone(),
            from: from.into(),
            to: to.clone(),
            offset: self.epoch.elapsed(),
            recorded_at: Utc::now(),
            trigger,
            context,
        };
        let mut inner = self.inner.lock();
        inner.current_states.insert(machine, to);
        inner.transitions.push(transition);
    }

    /// All committed calls, in completion order.
    #[must_use]
    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().calls.clone()
    }

    /// Committed calls for one method name.
    #[must_use]
    pub fn calls_for(&self, method: &str) -> Vec<MethodCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// Committed-call count for one method.
    #[must_use]
    pub fn call_count(&self, method: &str) -> u32 {
        self.inner.lock().method_counts.get(method).copied().unwrap_or(0)
    }

    /// Committed-call count across all methods.
    #[must_use]
    pub fn total_call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// All resource events, in order.
    #[must_use]
    pub fn resource_events(&self) -> Vec<ResourceEvent> {
        self.inner.lock().events.clone()
    }

    /// Resource events for one resource id.
    #[must_use]
    pub fn events_for_resource(&self, id: u64) -> Vec<ResourceEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|event| event.id == id)
            .cloned()
            .collect()
    }

    /// Resources created and not yet destroyed.
    #[must_use]
    pub fn active_resources(&self) -> Vec<ActiveResource> {
        let mut active: Vec<ActiveResource> = self.inner.lock().active.values().cloned().collect();
        active.sort_by_key(|resource| resource.id);
        active
    }

    /// All state transitions, in order.
    #[must_use]
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.inner.lock().transitions.clone()
    }

    /// Latest recorded state for a named machine.
    #[must_use]
    pub fn current_state(&self, machine: &str) -> Option<String> {
        self.inner.lock().current_states.get(machine).cloned()
    }

    /// Whether the method has at least one committed call.
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// Whether some committed call to `method` carried exactly these
    /// positional parameter values. A tag mismatch simply fails the match.
    #[must_use]
    pub fn was_called_with(&self, method: &str, expected: &[Value]) -> bool {
        self.inner.lock().calls.iter().any(|call| {
            call.method == method
                && call.params.len() == expected.len()
                && call
                    .params
                    .iter()
                    .zip(expected)
                    .all(|((_, actual), want)| actual == want)
        })
    }

    /// Whether the first `expected.len()` committed calls match `expected`
    /// exactly, in order. A history shorter than the expectation fails.
    #[must_use]
    pub fn verify_call_sequence(&self, expected: &[&str]) -> bool {
        let inner = self.inner.lock();
        if inner.calls.len() < expected.len() {
            return false;
        }
        inner
            .calls
            .iter()
            .zip(expected)
            .all(|(call, want)| call.method == *want)
    }

    /// Aggregate figures over the whole recording.
    #[must_use]
    pub fn statistics(&self) -> TrackerStatistics {
        Self::statistics_locked(&self.inner.lock())
    }

    /// Aggregation body shared with [`Self::render_report`], which needs the
    /// statistics and the listed detail under one guard.
    fn statistics_locked(inner: &TrackerInner) -> TrackerStatistics {
        let successful = inner.calls.iter().filter(|call| call.success).count();
        let created = inner
            .events
            .iter()
            .filter(|event| event.kind == ResourceEventKind::Created)
            .count();
        let destroyed = inner
            .events
            .iter()
            .filter(|event| event.kind == ResourceEventKind::Destroyed)
            .count();

        let tracking_span = match (inner.calls.first(), inner.calls.last()) {
            (Some(first), Some(last)) => last.offset.saturating_sub(first.offset),
            _ => Duration::ZERO,
        };
        let mean_inter_call = if inner.calls.is_empty() {
            Duration::ZERO
        } else {
            tracking_span / u32::try_from(inner.calls.len()).unwrap_or(u32::MAX)
        };

        TrackerStatistics {
            total_calls: inner.calls.len(),
            successful_calls: successful,
            failed_calls: inner.calls.len() - successful,
            resources_created: created,
            resources_destroyed: destroyed,
            active_resources: inner.active.len(),
            state_transitions: inner.transitions.len(),
            tracking_span,
            mean_inter_call,
        }
    }

    /// Human-readable summary: statistics, per-method counts, the last ten
    /// calls, and resources still alive.
    #[must_use]
    pub fn render_report(&self) -> String {
        // One guard for statistics and detail, so the header totals always
        // agree with the listed calls and resources.
        let inner = self.inner.lock();
        let stats = Self::statistics_locked(&inner);
        let mut out = String::new();

        let _ = writeln!(out, "=== State Tracker Report ===");
        let _ = writeln!(
            out,
            "calls: {} total, {} ok, {} failed",
            stats.total_calls, stats.successful_calls, stats.failed_calls
        );
        let _ = writeln!(
            out,
            "resources: {} created, {} destroyed, {} active",
            stats.resources_created, stats.resources_destroyed, stats.active_resources
        );
        let _ = writeln!(out, "state transitions: {}", stats.state_transitions);
        let _ = writeln!(
            out,
            "span: {:?}, mean inter-call gap: {:?}",
            stats.tracking_span, stats.mean_inter_call
        );

        let _ = writeln!(out, "\n--- Calls per method ---");
        let mut counts: Vec<(&String, &u32)> = inner.method_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (method, count) in counts {
            let _ = writeln!(out, "  {method}: {count}");
        }

        let _ = writeln!(out, "\n--- Last {} calls ---", inner.calls.len().min(10));
        let tail_start = inner.calls.len().saturating_sub(10);
        for call in &inner.calls[tail_start..] {
            let outcome = if call.success {
                "ok".to_string()
            } else {
                format!("failed: {}", call.error.as_deref().unwrap_or("?"))
            };
            let _ = writeln!(out, "  [{:?}] {} -> {outcome}", call.offset, call.method);
        }

        if !inner.active.is_empty() {
            let _ = writeln!(out, "\n--- Active resources ---");
            let mut active: Vec<&ActiveResource> = inner.active.values().collect();
            active.sort_by_key(|resource| resource.id);
            for resource in active {
                let name = resource.debug_name.as_deref().unwrap_or("-");
                let _ = writeln!(
                    out,
                    "  #{} {} ({} bytes) {name}",
                    resource.id, resource.resource_type, resource.size_bytes
                );
            }
        }

        out
    }

    /// Drop every record, count, and cached state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.calls.clear();
        inner.events.clear();
        inner.transitions.clear();
        inner.method_counts.clear();
        inner.active.clear();
        inner.current_states.clear();
    }
}

/// Guard owning one in-flight call record.
///
/// The record commits to the tracker exactly once, when the guard drops. That
/// covers the happy path, early returns, and panic unwinds alike.
#[derive(Debug)]
pub struct CallScope<'a> {
    tracker: &'a StateTracker,
    record: Option<MethodCall>,
}

impl CallScope<'_> {
    /// Attach a named parameter.
    pub fn arg(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if let Some(record) = &mut self.record {
            record.params.push((name.into(), value.into()));
        }
        self
    }

    /// Mark the call successful with a return value.
    pub fn succeed(&mut self, return_value: impl Into<Value>) {
        if let Some(record) = &mut self.record {
            record.success = true;
            record.return_value = return_value.into();
            record.error = None;
        }
    }

    /// Mark the call failed with an error description.
    pub fn fail(&mut self, error: impl Into<String>) {
        if let Some(record) = &mut self.record {
            record.success = false;
            record.error = Some(error.into());
        }
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.tracker.commit(record);
        }
    }
}
