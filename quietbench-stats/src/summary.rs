//! Summary Statistics
//!
//! Computes summary statistics for a built [`Distribution`]. Every value in the
//! distribution already passed the temporal filter, so mean, median, stddev
//! and the percentiles are all computed over the same accepted samples.
//! Sums go through [`Accumulator`] so the mean is exact up to the final
//! rounding, however many samples were recorded.

use crate::accumulator::Accumulator;
use crate::distribution::Distribution;
use crate::percentiles::compute_percentiles;
use serde::Serialize;

/// Comprehensive summary statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    // Central tendency
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,

    // Extremes
    pub min: i64,
    pub max: i64,

    // Nearest-rank percentiles
    pub p50: i64,
    pub p90: i64,
    pub p95: i64,
    pub p99: i64,
    pub p999: i64,

    // Sample info
    pub sample_count: u64,
    pub distinct_values: usize,
}

/// Compute summary statistics for a distribution
pub fn compute_summary(dist: &Distribution) -> SummaryStatistics {
    let n = dist.len();
    let mean = dist.mean();

    // Even counts average the two middle ranks
    let median = if n % 2 == 0 {
        let lo = dist.value_at_rank(n / 2 - 1) as f64;
        let hi = dist.value_at_rank(n / 2) as f64;
        lo + (hi - lo) / 2.0
    } else {
        dist.value_at_rank(n / 2) as f64
    };

    let std_dev = if n < 2 {
        0.0
    } else {
        let squares: Accumulator = dist
            .bins()
            .map(|(value, count)| count as f64 * (value as f64 - mean).powi(2))
            .collect();
        (squares.to_f64() / (n - 1) as f64).sqrt()
    };

    let percentiles = compute_percentiles(dist);

    SummaryStatistics {
        mean,
        median,
        std_dev,
        min: dist.min(),
        max: dist.max(),
        p50: percentiles.p50,
        p90: percentiles.p90,
        p95: percentiles.p95,
        p99: percentiles.p99,
        p999: percentiles.p999,
        sample_count: n,
        distinct_values: dist.num_bins(),
    }
}

impl SummaryStatistics {
    /// Coefficient of variation (relative stddev)
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean.abs()) * 100.0
        }
    }

    /// Check if distribution appears stable (low CV)
    pub fn is_stable(&self, cv_threshold: f64) -> bool {
        self.coefficient_of_variation() < cv_threshold
    }
}
