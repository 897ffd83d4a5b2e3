//! Mock driver wrapper, capability surface, and the worked memory example.

pub mod capability;
pub mod memory;
pub mod wrapper;

pub use capability::{Capability, DriverProfile, PerformanceTier, capabilities_in, capability_mask};
pub use memory::{MemoryBackend, MemoryDriver};
pub use wrapper::{DriverBackend, DriverState, MockDriver};
