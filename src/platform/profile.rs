//! Platform detection and the per-platform limits table.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::config::SlaOverrides;
use crate::core::errors::{Result, TestkitError};

/// Platforms the harness adapts its expectations to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    Dreamcast,
    Psp,
    Web,
    MacOs,
    Linux,
    Windows,
    Unknown,
}

impl PlatformKind {
    /// Platform of the running build.
    ///
    /// Embedded consoles never compile this crate natively, so detection only
    /// distinguishes the host families; console profiles are selected by name
    /// through [`PlatformKind::parse`] or the config override.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(target_family = "wasm") {
            Self::Web
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Unknown
        }
    }

    /// Resolve a platform name from configuration.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dreamcast" => Ok(Self::Dreamcast),
            "psp" => Ok(Self::Psp),
            "web" | "wasm" => Ok(Self::Web),
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            "unknown" => Ok(Self::Unknown),
            other => Err(TestkitError::UnsupportedPlatform {
                details: format!("unrecognized platform name '{other}'"),
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dreamcast => "Dreamcast",
            Self::Psp => "PSP",
            Self::Web => "Web",
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Unknown => "Unknown",
        }
    }

    /// Baseline expectations for this platform.
    #[must_use]
    pub const fn limits(self) -> PlatformLimits {
        match self {
            Self::Dreamcast => PlatformLimits {
                max_allocation_bytes: 1024 * 1024,
                max_p95_latency: Duration::from_millis(5),
                min_throughput_ops: 100.0,
                max_concurrent_ops: 4,
            },
            Self::Psp => PlatformLimits {
                max_allocation_bytes: 2 * 1024 * 1024,
                max_p95_latency: Duration::from_millis(2),
                min_throughput_ops: 500.0,
                max_concurrent_ops: 8,
            },
            Self::Web => PlatformLimits {
                max_allocation_bytes: 50 * 1024 * 1024,
                max_p95_latency: Duration::from_millis(10),
                min_throughput_ops: 200.0,
                max_concurrent_ops: 16,
            },
            Self::MacOs | Self::Linux | Self::Windows => PlatformLimits {
                max_allocation_bytes: 100 * 1024 * 1024,
                max_p95_latency: Duration::from_millis(1),
                min_throughput_ops: 10_000.0,
                max_concurrent_ops: 64,
            },
            Self::Unknown => PlatformLimits {
                max_allocation_bytes: 10 * 1024 * 1024,
                max_p95_latency: Duration::from_millis(5),
                min_throughput_ops: 1_000.0,
                max_concurrent_ops: 16,
            },
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource and performance ceilings a platform is held to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformLimits {
    pub max_allocation_bytes: u64,
    pub max_p95_latency: Duration,
    pub min_throughput_ops: f64,
    pub max_concurrent_ops: usize,
}

impl PlatformLimits {
    /// Apply configured overrides on top of the table values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &SlaOverrides) -> Self {
        if let Some(us) = overrides.max_p95_latency_us {
            self.max_p95_latency = Duration::from_micros(us);
        }
        if let Some(ops) = overrides.min_throughput_ops {
            self.min_throughput_ops = ops;
        }
        if let Some(bytes) = overrides.max_allocation_bytes {
            self.max_allocation_bytes = bytes;
        }
        if let Some(ops) = overrides.max_concurrent_ops {
            self.max_concurrent_ops = ops;
        }
        self
    }
}
