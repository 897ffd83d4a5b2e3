//! Harness configuration: TOML file + smart defaults.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TestkitError};

/// Full testkit configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub executor: ExecutorConfig,
    pub stress: StressConfig,
    pub sla: SlaOverrides,
    pub injection: InjectionConfig,
    pub log: crate::logger::jsonl::JsonlConfig,
}

/// Test-executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Deadline applied when a scenario does not declare its own.
    pub default_timeout_ms: u64,
    /// Force the detected platform (e.g. "Dreamcast") instead of probing.
    pub platform_override: Option<String>,
    /// Emit per-test progress lines while a suite runs.
    pub verbose: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            platform_override: None,
            verbose: false,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Defaults for concurrent stress measurement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StressConfig {
    pub workers: usize,
    pub iterations_per_worker: usize,
    pub enabled: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            iterations_per_worker: 100,
            enabled: true,
        }
    }
}

/// Optional overrides for platform-derived SLA thresholds.
///
/// `None` keeps the value from the platform limits table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SlaOverrides {
    pub max_p95_latency_us: Option<u64>,
    pub min_throughput_ops: Option<f64>,
    pub max_allocation_bytes: Option<u64>,
    pub max_concurrent_ops: Option<usize>,
}

/// Error-injection master switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InjectionConfig {
    pub enabled: bool,
    /// Seed for failure draws; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from an explicit TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TestkitError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| TestkitError::Runtime {
            details: format!("reading {}: {source}", path.display()),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that would make the harness misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.executor.default_timeout_ms == 0 {
            return Err(TestkitError::InvalidConfig {
                details: "executor.default_timeout_ms must be positive".to_string(),
            });
        }
        if self.stress.workers == 0 {
            return Err(TestkitError::InvalidConfig {
                details: "stress.workers must be positive".to_string(),
            });
        }
        if self.stress.iterations_per_worker == 0 {
            return Err(TestkitError::InvalidConfig {
                details: "stress.iterations_per_worker must be positive".to_string(),
            });
        }
        if let Some(throughput) = self.sla.min_throughput_ops
            && (!throughput.is_finite() || throughput < 0.0)
        {
            return Err(TestkitError::InvalidConfig {
                details: "sla.min_throughput_ops must be finite and non-negative".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = HarnessConfig::default();
        cfg.validate().expect("defaults must validate");
        assert_eq!(cfg.executor.default_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.stress.workers, 4);
        assert!(cfg.injection.enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = HarnessConfig::from_toml_str(
            "[executor]\n\
             default_timeout_ms = 5000\n\
             platform_override = \"Dreamcast\"\n",
        )
        .expect("partial config should parse");
        assert_eq!(cfg.executor.default_timeout_ms, 5000);
        assert_eq!(cfg.executor.platform_override.as_deref(), Some("Dreamcast"));
        assert_eq!(cfg.stress.iterations_per_worker, 100);
    }

    #[test]
    fn log_section_parses() {
        let cfg = HarnessConfig::from_toml_str(
            "[log]\n\
             path = \"/tmp/htk-run.jsonl\"\n\
             stderr_fallback = true\n",
        )
        .expect("log section should parse");
        assert!(cfg.log.stderr_fallback);
        assert!(cfg.log.path.is_some());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = HarnessConfig::from_toml_str("[executor]\ndefault_timeout_ms = 0\n")
            .expect_err("zero timeout must fail validation");
        assert_eq!(err.code(), "HTK-1001");
    }

    #[test]
    fn zero_stress_workers_rejected() {
        let err = HarnessConfig::from_toml_str("[stress]\nworkers = 0\n")
            .expect_err("zero workers must fail validation");
        assert_eq!(err.code(), "HTK-1001");
    }

    #[test]
    fn negative_throughput_override_rejected() {
        let err = HarnessConfig::from_toml_str("[sla]\nmin_throughput_ops = -1.0\n")
            .expect_err("negative throughput must fail validation");
        assert_eq!(err.code(), "HTK-1001");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = HarnessConfig::from_toml_str("= nonsense").expect_err("must fail");
        assert_eq!(err.code(), "HTK-1003");
    }

    #[test]
    fn load_missing_file_reports_missing_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = HarnessConfig::load(&dir.path().join("absent.toml"))
            .expect_err("missing file must error");
        assert_eq!(err.code(), "HTK-1002");
    }

    #[test]
    fn load_round_trips_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("harness.toml");
        let mut cfg = HarnessConfig::default();
        cfg.stress.workers = 8;
        cfg.injection.seed = Some(7);
        std::fs::write(&path, toml::to_string(&cfg).expect("serialize")).expect("write");

        let loaded = HarnessConfig::load(&path).expect("load");
        assert_eq!(loaded, cfg);
    }
}
