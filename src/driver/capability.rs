//! Driver capability flags and performance classification.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Individual driver capability, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Capability {
    MemoryAllocation = 1 << 0,
    DmaTransfer = 1 << 1,
    MemoryMapping = 1 << 2,
    HardwareAcceleration = 1 << 3,
    Threading = 1 << 4,
    PowerManagement = 1 << 5,
    ErrorRecovery = 1 << 6,
    Statistics = 1 << 7,
}

impl Capability {
    /// All defined capabilities, in bit order.
    pub const ALL: [Self; 8] = [
        Self::MemoryAllocation,
        Self::DmaTransfer,
        Self::MemoryMapping,
        Self::HardwareAcceleration,
        Self::Threading,
        Self::PowerManagement,
        Self::ErrorRecovery,
        Self::Statistics,
    ];

    #[must_use]
    pub const fn bit(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MemoryAllocation => "memory-allocation",
            Self::DmaTransfer => "dma-transfer",
            Self::MemoryMapping => "memory-mapping",
            Self::HardwareAcceleration => "hardware-acceleration",
            Self::Threading => "threading",
            Self::PowerManagement => "power-management",
            Self::ErrorRecovery => "error-recovery",
            Self::Statistics => "statistics",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine capabilities into one mask.
#[must_use]
pub fn capability_mask(caps: &[Capability]) -> u32 {
    caps.iter().fold(0, |mask, cap| mask | cap.bit())
}

/// Decode a mask back into individual capabilities. Unknown bits are dropped.
#[must_use]
pub fn capabilities_in(mask: u32) -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|cap| mask & cap.bit() != 0)
        .collect()
}

/// Rough performance class a driver advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum PerformanceTier {
    Minimal,
    Limited,
    #[default]
    Standard,
    High,
}

/// Static descriptor a mocked driver reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub name: String,
    pub version: String,
    pub tier: PerformanceTier,
    pub capability_mask: u32,
}

impl DriverProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, tier: PerformanceTier, caps: &[Capability]) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            tier,
            capability_mask: capability_mask(caps),
        }
    }

    #[must_use]
    pub const fn supports(&self, cap: Capability) -> bool {
        self.capability_mask & cap.bit() != 0
    }

    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        capabilities_in(self.capability_mask)
    }
}
