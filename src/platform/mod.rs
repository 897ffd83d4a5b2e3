//! Platform detection and adaptive limits.

pub mod profile;

pub use profile::{PlatformKind, PlatformLimits};
