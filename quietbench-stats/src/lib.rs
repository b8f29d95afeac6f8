#![warn(missing_docs)]
//! QuietBench Statistical Engine
//!
//! Turns noisy timing samples into trustworthy statistics:
//! - Exact floating-point summation with a superaccumulator
//! - Compact empirical distributions (sorted value/count bins) with
//!   rank-based sampling, scaling and resampled difference/ratio
//! - A sliding-window temporal filter that rejects single interruption outliers
//! - Percentiles, summary statistics and A/B comparison built on top of them

mod accumulator;
mod comparison;
mod distribution;
mod percentiles;
mod summary;
mod temporal_filter;

pub use accumulator::{Accumulator, WORD_COUNT, exact_mean, exact_sum};
pub use comparison::{
    ComparisonConfig, ComparisonError, ComparisonResult, EffectInterpretation, RATIO_SCALE,
    compare_distributions,
};
pub use distribution::{DEFAULT_CAPACITY, Distribution, DistributionBuilder, DistributionError};
pub use percentiles::{Percentiles, compute_percentile, compute_percentiles};
pub use summary::{SummaryStatistics, compute_summary};
pub use temporal_filter::{DEFAULT_TOLERANCE, FilterOutcome, TemporalFilter};

/// Default confidence level (95%)
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Default number of bootstrap resamples in a comparison
pub const DEFAULT_BOOTSTRAP_ITERATIONS: usize = 1_000;

/// Default significance threshold (relative change, in percent)
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 5.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(WORD_COUNT, 34);
        assert_eq!(DEFAULT_CAPACITY, 170);
        assert!((DEFAULT_TOLERANCE - 1.0).abs() < f64::EPSILON);
        assert_eq!(DEFAULT_BOOTSTRAP_ITERATIONS, 1_000);
        assert!((DEFAULT_CONFIDENCE_LEVEL - 0.95).abs() < f64::EPSILON);
        assert!((DEFAULT_SIGNIFICANCE_THRESHOLD - 5.0).abs() < f64::EPSILON);
    }
}
