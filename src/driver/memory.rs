//! Worked example backend: a simulated memory driver.

use std::collections::HashMap;
use std::sync::Arc;

use crate::behavior::registry::BehaviorRegistry;
use crate::core::errors::{DriverError, Result};
use crate::driver::capability::{Capability, DriverProfile, PerformanceTier};
use crate::driver::wrapper::{DriverBackend, MockDriver};
use crate::tracker::state::{ResourceEventKind, StateTracker};
use crate::tracker::value::Value;

/// Simulated allocator state: id-keyed byte blocks.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blocks: HashMap<u64, Vec<u8>>,
    next_id: u64,
}

impl MemoryBackend {
    fn allocate(&mut self, size: usize) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.blocks.insert(id, vec![0; size]);
        id
    }

    fn block(&self, id: u64) -> std::result::Result<&Vec<u8>, DriverError> {
        self.blocks
            .get(&id)
            .ok_or_else(|| DriverError::invalid_parameter(1, format!("unknown block id {id}")))
    }

    fn block_mut(&mut self, id: u64) -> std::result::Result<&mut Vec<u8>, DriverError> {
        self.blocks
            .get_mut(&id)
            .ok_or_else(|| DriverError::invalid_parameter(1, format!("unknown block id {id}")))
    }
}

impl DriverBackend for MemoryBackend {
    fn name(&self) -> &str {
        "mock-memory"
    }

    fn profile(&self) -> DriverProfile {
        DriverProfile::new(
            "mock-memory",
            PerformanceTier::Standard,
            &[
                Capability::MemoryAllocation,
                Capability::MemoryMapping,
                Capability::Statistics,
            ],
        )
    }
}

/// Simulated memory driver built on the behavior funnel.
///
/// Each operation runs through the gate under its own method name, and
/// successful calls emit the matching resource event (allocate → Created,
/// write → Modified, read → Accessed, deallocate → Destroyed).
pub struct MemoryDriver {
    inner: MockDriver<MemoryBackend>,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MockDriver::new(MemoryBackend::default()),
        }
    }

    /// Driver whose injection is driven by a shared registry.
    #[must_use]
    pub fn with_registry(registry: Arc<BehaviorRegistry>) -> Self {
        Self {
            inner: MockDriver::with_registry(MemoryBackend::default(), registry),
        }
    }

    /// The underlying funnel, for capability and lifecycle access.
    #[must_use]
    pub const fn driver(&self) -> &MockDriver<MemoryBackend> {
        &self.inner
    }

    #[must_use]
    pub fn registry(&self) -> Arc<BehaviorRegistry> {
        self.inner.registry()
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<StateTracker> {
        self.inner.tracker()
    }

    pub fn initialize(&self) -> Result<()> {
        self.inner.initialize()?;
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()?;
        Ok(())
    }

    /// Allocate a zeroed block, returning its id.
    pub fn allocate(&self, size: usize) -> Result<u64> {
        let value = self.inner.run_method(
            "allocate",
            vec![("size".to_string(), Value::from(size))],
            |backend| Ok(Value::from(backend.allocate(size))),
        )?;
        let id = value.try_as::<u64>()?;
        self.tracker()
            .record_resource_event(ResourceEventKind::Created, id, "memory_block", size as u64);
        Ok(id)
    }

    /// Release a block.
    pub fn deallocate(&self, id: u64) -> Result<()> {
        let size = self.inner.run_method(
            "deallocate",
            vec![("id".to_string(), Value::from(id))],
            |backend| {
                let block = backend
                    .blocks
                    .remove(&id)
                    .ok_or_else(|| {
                        DriverError::invalid_parameter(1, format!("unknown block id {id}"))
                    })?;
                Ok(Value::from(block.len()))
            },
        )?;
        self.tracker().record_resource_event(
            ResourceEventKind::Destroyed,
            id,
            "memory_block",
            size.try_as::<u64>()?,
        );
        Ok(())
    }

    /// Copy bytes out of a block.
    pub fn read(&self, id: u64, offset: usize, len: usize) -> Result<Vec<u8>> {
        let value = self.inner.run_method(
            "read",
            vec![
                ("id".to_string(), Value::from(id)),
                ("offset".to_string(), Value::from(offset)),
                ("len".to_string(), Value::from(len)),
            ],
            |backend| {
                let block = backend.block(id)?;
                let end = offset.checked_add(len).filter(|&end| end <= block.len());
                let Some(end) = end else {
                    return Err(DriverError::invalid_parameter(
                        2,
                        format!("read {offset}+{len} out of range for block of {}", block.len()),
                    ));
                };
                Ok(Value::from(block[offset..end].to_vec()))
            },
        )?;
        let data = value.try_as::<Vec<u8>>()?;
        self.tracker().record_resource_event(
            ResourceEventKind::Accessed,
            id,
            "memory_block",
            data.len() as u64,
        );
        Ok(data)
    }

    /// Copy bytes into a block.
    pub fn write(&self, id: u64, offset: usize, data: &[u8]) -> Result<()> {
        self.inner.run_method(
            "write",
            vec![
                ("id".to_string(), Value::from(id)),
                ("offset".to_string(), Value::from(offset)),
                ("data".to_string(), Value::from(data.to_vec())),
            ],
            |backend| {
                let block = backend.block_mut(id)?;
                let end = offset
                    .checked_add(data.len())
                    .filter(|&end| end <= block.len());
                let Some(end) = end else {
                    return Err(DriverError::invalid_parameter(
                        2,
                        format!(
                            "write {offset}+{} out of range for block of {}",
                            data.len(),
                            block.len()
                        ),
                    ));
                };
                block[offset..end].copy_from_slice(data);
                Ok(Value::Unit)
            },
        )?;
        self.tracker().record_resource_event(
            ResourceEventKind::Modified,
            id,
            "memory_block",
            data.len() as u64,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::config::MethodBehavior;
    use crate::core::errors::{ErrorCategory, TestkitError};

    fn seeded() -> MemoryDriver {
        MemoryDriver::with_registry(Arc::new(BehaviorRegistry::with_seed(1)))
    }

    #[test]
    fn allocate_write_read_round_trip() {
        let driver = seeded();
        driver.initialize().expect("init");
        let id = driver.allocate(64).expect("allocate");
        driver.write(id, 8, &[0xAA, 0xBB]).expect("write");
        assert_eq!(driver.read(id, 8, 2).expect("read"), vec![0xAA, 0xBB]);
        assert_eq!(driver.read(id, 0, 1).expect("read zeroed"), vec![0]);
    }

    #[test]
    fn resource_events_track_block_lifecycle() {
        let driver = seeded();
        driver.initialize().expect("init");
        let id = driver.allocate(32).expect("allocate");
        driver.write(id, 0, &[1]).expect("write");
        driver.read(id, 0, 1).expect("read");
        driver.deallocate(id).expect("deallocate");

        let tracker = driver.tracker();
        let kinds: Vec<ResourceEventKind> = tracker
            .events_for_resource(id)
            .into_iter()
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ResourceEventKind::Created,
                ResourceEventKind::Modified,
                ResourceEventKind::Accessed,
                ResourceEventKind::Destroyed,
            ]
        );
        assert!(tracker.active_resources().is_empty());
    }

    #[test]
    fn out_of_range_read_is_invalid_parameter() {
        let driver = seeded();
        let id = driver.allocate(8).expect("allocate");
        let err = driver.read(id, 4, 8).expect_err("must reject");
        match err {
            TestkitError::Driver(inner) => {
                assert_eq!(inner.category, ErrorCategory::Configuration);
            }
            other => panic!("expected driver error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_is_rejected_and_recorded() {
        let driver = seeded();
        assert!(driver.deallocate(99).is_err());
        let tracker = driver.tracker();
        assert_eq!(tracker.call_count("deallocate"), 1);
        assert!(!tracker.calls_for("deallocate")[0].success);
        // No Destroyed event for a failed deallocate.
        assert!(tracker.events_for_resource(99).is_empty());
    }

    #[test]
    fn injected_allocate_failures_follow_configuration() {
        let driver = seeded();
        driver
            .registry()
            .set_method_behavior("allocate", MethodBehavior::fail_after_calls(3));

        let mut ok = 0;
        let mut failed = 0;
        for _ in 0..5 {
            match driver.allocate(16) {
                Ok(_) => ok += 1,
                Err(_) => failed += 1,
            }
        }
        assert_eq!((ok, failed), (3, 2));
        assert_eq!(driver.registry().call_count("allocate"), 5);
        assert_eq!(driver.tracker().active_resources().len(), 3);
    }
}
