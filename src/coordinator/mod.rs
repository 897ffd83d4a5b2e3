//! Driver coordination boundary: message-bus traits, a loopback reference
//! bus, and the coordinator tests interact with.
//!
//! The transport is a trait seam on purpose. Tests exercise coordination
//! semantics against [`LoopbackBus`]; a real transport plugs in behind
//! [`MessageBus`] without touching the harness.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::core::errors::{DriverError, Result, TestkitError};

/// Message counters a bus exposes for stability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusStats {
    /// Messages accepted for delivery.
    pub sent: u64,
    /// Messages whose handler invocation has completed.
    pub received: u64,
}

/// Receives messages addressed to one registered driver.
pub trait MessageHandler: Send + Sync {
    /// Handle one message. Errors propagate to the sender.
    fn handle_message(&self, from: &str, payload: &[u8]) -> Result<()>;
}

/// Message transport between registered drivers.
pub trait MessageBus: Send + Sync {
    /// Attach a handler under a driver name.
    fn register(&self, name: &str, handler: Arc<dyn MessageHandler>) -> Result<()>;

    /// Detach a handler. Unknown names are ignored.
    fn unregister(&self, name: &str);

    /// Deliver a payload from one driver to another.
    fn send(&self, from: &str, to: &str, payload: &[u8]) -> Result<()>;

    /// Current send/receive counters.
    fn stats(&self) -> BusStats;
}

/// In-process bus delivering synchronously on the caller's thread.
#[derive(Default)]
pub struct LoopbackBus {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    stats: Mutex<BusStats>,
}

impl LoopbackBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageBus for LoopbackBus {
    fn register(&self, name: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(name) {
            return Err(DriverError::validation_failed(
                10,
                format!("handler '{name}' already registered"),
            )
            .into());
        }
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    fn unregister(&self, name: &str) {
        self.handlers.write().remove(name);
    }

    fn send(&self, from: &str, to: &str, payload: &[u8]) -> Result<()> {
        let handler = self
            .handlers
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| TestkitError::Coordinator {
                details: format!("no driver registered as '{to}'"),
            })?;
        self.stats.lock().sent += 1;
        // Synchronous delivery: received counts the handler invocation even
        // when the handler itself fails, so counters stay balanced.
        let outcome = handler.handle_message(from, payload);
        self.stats.lock().received += 1;
        outcome
    }

    fn stats(&self) -> BusStats {
        *self.stats.lock()
    }
}

/// Lifecycle status the coordinator tracks per registered driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatedDriverState {
    /// Driver is registered and reachable on the bus.
    Registered,
    /// Driver was registered once and has since been removed.
    Unregistered,
}

/// Registration and messaging front for a set of drivers under test.
pub struct DriverCoordinator {
    bus: Arc<dyn MessageBus>,
    inner: Mutex<CoordinatorInner>,
}

#[derive(Default)]
struct CoordinatorInner {
    initialized: bool,
    drivers: HashMap<String, CoordinatedDriverState>,
}

impl Default for DriverCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverCoordinator {
    /// Coordinator over a fresh loopback bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bus(Arc::new(LoopbackBus::new()))
    }

    /// Coordinator over an externally-provided transport.
    #[must_use]
    pub fn with_bus(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            inner: Mutex::new(CoordinatorInner::default()),
        }
    }

    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.initialized {
            return Err(TestkitError::Coordinator {
                details: "coordinator already initialized".to_string(),
            });
        }
        inner.initialized = true;
        Ok(())
    }

    /// Unregister everything and leave the coordinator unusable.
    pub fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.initialized {
            return Err(TestkitError::Coordinator {
                details: "coordinator not initialized".to_string(),
            });
        }
        for name in inner.drivers.keys() {
            self.bus.unregister(name);
        }
        inner.drivers.clear();
        inner.initialized = false;
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Register a driver's message handler under its name.
    pub fn register_driver(&self, name: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.initialized {
            return Err(DriverError::internal(
                20,
                format!("registration of '{name}' before coordinator initialize"),
            )
            .into());
        }
        if inner.drivers.get(name) == Some(&CoordinatedDriverState::Registered) {
            return Err(DriverError::validation_failed(
                11,
                format!("driver '{name}' already registered"),
            )
            .into());
        }
        self.bus.register(name, handler)?;
        inner
            .drivers
            .insert(name.to_string(), CoordinatedDriverState::Registered);
        Ok(())
    }

    /// Remove a driver. Unknown names are reported, not ignored.
    pub fn unregister_driver(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.drivers.get_mut(name) {
            Some(state @ CoordinatedDriverState::Registered) => {
                *state = CoordinatedDriverState::Unregistered;
                self.bus.unregister(name);
                Ok(())
            }
            _ => Err(TestkitError::Coordinator {
                details: format!("driver '{name}' is not registered"),
            }),
        }
    }

    /// Send a payload between registered drivers.
    pub fn send_message(&self, from: &str, to: &str, payload: &[u8]) -> Result<()> {
        if !self.is_initialized() {
            return Err(TestkitError::Coordinator {
                details: "send before coordinator initialize".to_string(),
            });
        }
        self.bus.send(from, to, payload)
    }

    /// Snapshot of every driver the coordinator has seen.
    #[must_use]
    pub fn driver_states(&self) -> HashMap<String, CoordinatedDriverState> {
        self.inner.lock().drivers.clone()
    }

    /// Stable means the bus has received everything it sent.
    #[must_use]
    pub fn is_system_stable(&self) -> bool {
        let stats = self.bus.stats();
        stats.sent == stats.received
    }

    /// Poll for stability every 10ms until the deadline.
    pub fn wait_for_message_processing(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_system_stable() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let stats = self.bus.stats();
                return Err(TestkitError::Coordinator {
                    details: format!(
                        "messages still in flight after {timeout:?}: sent {} received {}",
                        stats.sent, stats.received
                    ),
                });
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}
