#![warn(missing_docs)]
//! # QuietBench
//!
//! Noise-resistant timing statistics for Rust.
//!
//! QuietBench turns raw nanosecond samples into distributions you can trust:
//! - **Temporal Filtering**: a sliding window rejects samples inflated by a
//!   single interruption (preemption, interrupt, page fault), and takes them
//!   back if later samples show they were normal
//! - **Compact Distributions**: sorted value/count bins in one allocation,
//!   with rank-based sampling, percentiles and exact means
//! - **Exact Summation**: a superaccumulator adds any number of doubles with
//!   a single final rounding
//! - **A/B Comparison**: resampled difference and ratio distributions give
//!   probability of regression, confidence intervals and effect size
//!
//! ## Quick Start
//!
//! ```ignore
//! use quietbench::prelude::*;
//!
//! let mut bencher: Bencher = Bencher::new();
//! bencher.warmup(1_000, || expensive_operation());
//! bencher.run(10_000, || expensive_operation());
//!
//! let result = bencher.finish()?;
//! println!("median: {} ns", result.stats.median);
//! ```
//!
//! ## Feeding your own samples
//!
//! ```ignore
//! let mut recorder = SampleRecorder::<8>::new();
//! recorder.extend(samples);
//! let run = recorder.finish()?;
//! let p99 = compute_percentile(&run.distribution, 99.0);
//! ```

// Re-export measurement types
pub use quietbench_core::{
    Bencher, BenchmarkResult, DEFAULT_WINDOW, Recorded, RecordedRun, RecorderError,
    RecorderStats, SampleRecorder, Timer,
};

// Re-export stats
pub use quietbench_stats::{
    Accumulator, ComparisonConfig, ComparisonError, ComparisonResult, Distribution,
    DistributionBuilder, DistributionError, EffectInterpretation, FilterOutcome, Percentiles,
    SummaryStatistics, TemporalFilter, compare_distributions, compute_percentile,
    compute_percentiles, compute_summary, exact_mean, exact_sum,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Bencher, Distribution, DistributionBuilder, SampleRecorder, TemporalFilter,
        compare_distributions, compute_percentile, compute_summary,
    };
}

/// Run the QuietBench CLI.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     quietbench::run()
/// }
/// ```
pub use quietbench_cli::run;
