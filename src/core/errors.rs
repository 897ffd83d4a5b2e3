//! HTK-prefixed error types with structured error codes, plus the HAL error
//! taxonomy materialized by behavior injection.

#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TestkitError>;

/// Error classification used by the HAL drivers under test.
///
/// Mirrors the category byte carried on every simulated driver error so test
/// assertions can branch on the class of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCategory {
    Hardware = 1,
    Driver = 2,
    Configuration = 3,
    Resource = 4,
    Platform = 5,
    Network = 6,
    Validation = 7,
    Internal = 8,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hardware => "Hardware",
            Self::Driver => "Driver",
            Self::Configuration => "Configuration",
            Self::Resource => "Resource",
            Self::Platform => "Platform",
            Self::Network => "Network",
            Self::Validation => "Validation",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured driver-level error: category + numeric code + message + context.
///
/// This is the value a configured failure materializes into. Equality compares
/// category and code only, so a test can match an injected error without
/// caring about message wording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverError {
    pub category: ErrorCategory,
    pub code: u32,
    pub message: String,
    pub context: Option<String>,
}

impl DriverError {
    #[must_use]
    pub fn new(category: ErrorCategory, code: u32, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Attach a free-form context string.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Combined identifier: category in the high byte, code below it.
    #[must_use]
    pub const fn error_id(&self) -> u32 {
        ((self.category as u32) << 24) | (self.code & 0x00FF_FFFF)
    }

    #[must_use]
    pub fn resource_exhausted(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Resource, code, message)
    }

    #[must_use]
    pub fn hardware_fault(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Hardware, code, message)
    }

    #[must_use]
    pub fn invalid_parameter(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, code, message)
    }

    #[must_use]
    pub fn invalid_state(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    #[must_use]
    pub fn validation_failed(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    #[must_use]
    pub fn network_timeout(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, code, message)
    }

    #[must_use]
    pub fn internal(code: u32, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }
}

impl PartialEq for DriverError {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.code == other.code
    }
}

impl Eq for DriverError {}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.category, self.code, self.message)?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

/// Top-level error type for the testkit.
#[derive(Debug, Error)]
pub enum TestkitError {
    #[error("[HTK-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HTK-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HTK-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HTK-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[HTK-2001] driver failure: {0}")]
    Driver(#[from] DriverError),

    #[error("[HTK-2002] typed value recovery failed: expected {expected}, found {found}")]
    ValueType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("[HTK-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HTK-3001] assertion failed: {message}")]
    AssertionFailed { message: String },

    #[error("[HTK-3002] test '{name}' exceeded deadline of {timeout:?}")]
    TestTimeout { name: String, timeout: Duration },

    #[error("[HTK-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[HTK-3004] unknown test: {name}")]
    UnknownTest { name: String },

    #[error("[HTK-3005] invalid test pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[HTK-3101] coordinator failure: {details}")]
    Coordinator { details: String },

    #[error("[HTK-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TestkitError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HTK-1001",
            Self::MissingConfig { .. } => "HTK-1002",
            Self::ConfigParse { .. } => "HTK-1003",
            Self::UnsupportedPlatform { .. } => "HTK-1101",
            Self::Driver(_) => "HTK-2001",
            Self::ValueType { .. } => "HTK-2002",
            Self::Serialization { .. } => "HTK-2101",
            Self::AssertionFailed { .. } => "HTK-3001",
            Self::TestTimeout { .. } => "HTK-3002",
            Self::ChannelClosed { .. } => "HTK-3003",
            Self::UnknownTest { .. } => "HTK-3004",
            Self::InvalidPattern { .. } => "HTK-3005",
            Self::Coordinator { .. } => "HTK-3101",
            Self::Runtime { .. } => "HTK-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TestTimeout { .. }
                | Self::ChannelClosed { .. }
                | Self::Coordinator { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for runtime failures.
    #[must_use]
    pub fn runtime(details: impl Into<String>) -> Self {
        Self::Runtime {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for TestkitError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TestkitError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
