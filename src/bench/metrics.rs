//! Latency and throughput statistics.

#![allow(missing_docs)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Distribution summary over a set of latency samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LatencyStats {
    pub samples: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub stddev: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencyStats {
    /// Summarize samples. Order does not matter; an empty set is all-zero.
    #[must_use]
    pub fn from_samples(mut samples: Vec<Duration>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();
        let count = samples.len();

        let total_nanos: u128 = samples.iter().map(Duration::as_nanos).sum();
        let mean_nanos = total_nanos / count as u128;

        #[allow(clippy::cast_precision_loss)]
        let variance = samples
            .iter()
            .map(|sample| {
                let diff = sample.as_nanos() as f64 - mean_nanos as f64;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stddev = Duration::from_nanos(variance.sqrt() as u64);

        Self {
            samples: count,
            min: samples[0],
            max: samples[count - 1],
            mean: duration_from_nanos(mean_nanos),
            median: samples[count / 2],
            stddev,
            p95: samples[percentile_index(count, 95)],
            p99: samples[percentile_index(count, 99)],
        }
    }
}

/// Nearest-rank percentile index into a sorted sample set.
fn percentile_index(count: usize, percentile: u32) -> usize {
    let rank = (count * percentile as usize).div_ceil(100);
    rank.saturating_sub(1).min(count - 1)
}

#[allow(clippy::cast_possible_truncation)]
fn duration_from_nanos(nanos: u128) -> Duration {
    Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
}

/// Work rate over a measured wall-clock window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Throughput {
    pub ops_per_sec: f64,
    pub items_per_sec: f64,
    pub bytes_per_sec: f64,
}

impl Throughput {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over(elapsed: Duration, ops: u64, items: u64, bytes: u64) -> Self {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Self::default();
        }
        Self {
            ops_per_sec: ops as f64 / secs,
            items_per_sec: items as f64 / secs,
            bytes_per_sec: bytes as f64 / secs,
        }
    }
}

/// Outcome of one benchmark run against a platform's expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub latency: LatencyStats,
    pub throughput: Throughput,
    pub total_ops: u64,
    pub failed_ops: u64,
    /// p95 within the platform's latency ceiling and throughput at or above
    /// its floor.
    pub sla_passed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micros(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&us| Duration::from_micros(us)).collect()
    }

    #[test]
    fn empty_samples_are_all_zero() {
        let stats = LatencyStats::from_samples(Vec::new());
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.p95, Duration::ZERO);
    }

    #[test]
    fn single_sample_is_its_own_distribution() {
        let stats = LatencyStats::from_samples(micros(&[500]));
        assert_eq!(stats.min, Duration::from_micros(500));
        assert_eq!(stats.max, Duration::from_micros(500));
        assert_eq!(stats.mean, Duration::from_micros(500));
        assert_eq!(stats.p99, Duration::from_micros(500));
        assert_eq!(stats.stddev, Duration::ZERO);
    }

    #[test]
    fn percentiles_come_from_sorted_order() {
        // 1..=100µs shuffled: p95 is the 95th value.
        let mut values: Vec<u64> = (1..=100).collect();
        values.reverse();
        let stats = LatencyStats::from_samples(micros(&values));
        assert_eq!(stats.min, Duration::from_micros(1));
        assert_eq!(stats.max, Duration::from_micros(100));
        assert_eq!(stats.p95, Duration::from_micros(95));
        assert_eq!(stats.p99, Duration::from_micros(99));
        assert_eq!(stats.median, Duration::from_micros(51));
    }

    #[test]
    fn mean_and_stddev_are_sane() {
        let stats = LatencyStats::from_samples(micros(&[10, 20, 30]));
        assert_eq!(stats.mean, Duration::from_micros(20));
        // population stddev of {10,20,30} is ~8.165µs
        assert!(stats.stddev > Duration::from_micros(8));
        assert!(stats.stddev < Duration::from_micros(9));
    }

    #[test]
    fn throughput_scales_with_time() {
        let t = Throughput::over(Duration::from_secs(2), 1000, 500, 4096);
        assert!((t.ops_per_sec - 500.0).abs() < f64::EPSILON);
        assert!((t.items_per_sec - 250.0).abs() < f64::EPSILON);
        assert!((t.bytes_per_sec - 2048.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_elapsed_yields_zero_rates() {
        let t = Throughput::over(Duration::ZERO, 1000, 1000, 1000);
        assert_eq!(t.ops_per_sec, 0.0);
    }
}
