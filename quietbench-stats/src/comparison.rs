//! A/B Comparison Statistics
//!
//! Compares a baseline and a candidate distribution. The confidence interval
//! and probability of regression come from bootstrapping the difference of
//! means. The per-pair difference and ratio distributions are approximated by
//! resampling and share one builder allocation.

use crate::distribution::{Distribution, DistributionBuilder};
use crate::percentiles::compute_percentile;
use crate::summary::{SummaryStatistics, compute_summary};
use rand::Rng;
use serde::Serialize;

/// Fixed-point scale of the ratio distribution (basis points)
pub const RATIO_SCALE: i64 = 10_000;

/// Result of comparing two distributions
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    /// Summary statistics for baseline
    pub baseline_stats: SummaryStatistics,
    /// Summary statistics for candidate
    pub candidate_stats: SummaryStatistics,
    /// Median of candidate / baseline, as a percent change
    pub relative_change: f64,
    /// Difference of means in nanoseconds
    pub absolute_change: f64,
    /// Probability that the candidate mean is slower than the baseline mean (0.0 to 1.0)
    pub probability_regression: f64,
    /// Share of sample pairs where the candidate sample is the slower one
    pub probability_slower_sample: f64,
    /// Confidence interval of the difference of means
    pub difference_ci_lower: f64,
    /// Confidence interval of the difference of means
    pub difference_ci_upper: f64,
    /// Whether the difference is statistically significant
    pub is_significant: bool,
    /// Effect size (Cohen's d)
    pub effect_size: f64,
    /// Effect size interpretation
    pub effect_interpretation: EffectInterpretation,
}

/// Interpretation of effect size magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectInterpretation {
    /// |d| < 0.2 - negligible difference
    Negligible,
    /// 0.2 <= |d| < 0.5 - small difference
    Small,
    /// 0.5 <= |d| < 0.8 - medium difference
    Medium,
    /// |d| >= 0.8 - large difference
    Large,
}

impl std::fmt::Display for EffectInterpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectInterpretation::Negligible => write!(f, "negligible"),
            EffectInterpretation::Small => write!(f, "small"),
            EffectInterpretation::Medium => write!(f, "medium"),
            EffectInterpretation::Large => write!(f, "large"),
        }
    }
}

/// Configuration for comparison
#[derive(Debug, Clone, Copy)]
pub struct ComparisonConfig {
    /// Confidence level (e.g., 0.95 for 95%)
    pub confidence_level: f64,
    /// Threshold for significance (relative change %)
    pub significance_threshold: f64,
    /// Number of bootstrap resamples of the difference of means
    pub bootstrap_iterations: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            confidence_level: crate::DEFAULT_CONFIDENCE_LEVEL,
            significance_threshold: crate::DEFAULT_SIGNIFICANCE_THRESHOLD,
            bootstrap_iterations: crate::DEFAULT_BOOTSTRAP_ITERATIONS,
        }
    }
}

/// Compare two distributions
///
/// Returns the probability that `candidate` is slower than `baseline`,
/// along with effect size and confidence intervals for the difference.
pub fn compare_distributions<R: Rng + ?Sized>(
    baseline: &Distribution,
    candidate: &Distribution,
    config: &ComparisonConfig,
    rng: &mut R,
) -> Result<ComparisonResult, ComparisonError> {
    // Validate inputs
    if baseline.len() < 2 {
        return Err(ComparisonError::InsufficientBaseline(baseline.len()));
    }
    if candidate.len() < 2 {
        return Err(ComparisonError::InsufficientCandidate(candidate.len()));
    }
    let level = config.confidence_level;
    if !(level > 0.0 && level < 1.0) {
        return Err(ComparisonError::InvalidConfidenceLevel(level));
    }
    if config.bootstrap_iterations == 0 {
        return Err(ComparisonError::NoBootstrapIterations);
    }

    let baseline_stats = compute_summary(baseline);
    let candidate_stats = compute_summary(candidate);
    let observed_diff = candidate_stats.mean - baseline_stats.mean;

    // Bootstrap the difference of means (candidate slower = positive)
    let shifts = bootstrap_mean_shifts(baseline, candidate, config.bootstrap_iterations, rng);
    let regressions = shifts.iter().filter(|&&d| d > 0.0).count();
    let probability_regression = regressions as f64 / shifts.len() as f64;

    let alpha = 1.0 - level;
    let lower_idx = (alpha / 2.0 * shifts.len() as f64) as usize;
    let upper_idx = ((1.0 - alpha / 2.0) * shifts.len() as f64) as usize;
    let difference_ci_lower = shifts[lower_idx.min(shifts.len() - 1)];
    let difference_ci_upper = shifts[upper_idx.min(shifts.len() - 1)];

    let difference = DistributionBuilder::new().subtract(candidate, baseline, rng);
    let not_slower = difference.count_at_most(0);
    let probability_slower_sample = 1.0 - not_slower as f64 / difference.len() as f64;

    let ratio = difference
        .reset()
        .scaled_div(candidate, RATIO_SCALE, baseline, rng);
    let median_ratio = compute_percentile(&ratio, 50.0);
    let relative_change = median_ratio as f64 * 100.0 / RATIO_SCALE as f64 - 100.0;
    ratio.finalize();

    // Effect size (Cohen's d)
    // Pooled standard deviation
    let n1 = baseline.len() as f64;
    let n2 = candidate.len() as f64;
    let var1 = baseline_stats.std_dev.powi(2);
    let var2 = candidate_stats.std_dev.powi(2);
    let pooled_std = ((((n1 - 1.0) * var1) + ((n2 - 1.0) * var2)) / (n1 + n2 - 2.0)).sqrt();

    let effect_size = if pooled_std > 0.0 {
        observed_diff / pooled_std
    } else {
        0.0
    };

    let effect_interpretation = interpret_effect_size(effect_size);

    // Significance: CI doesn't include zero AND change exceeds threshold
    let ci_excludes_zero = (difference_ci_lower > 0.0) || (difference_ci_upper < 0.0);
    let exceeds_threshold = relative_change.abs() >= config.significance_threshold;
    let is_significant = ci_excludes_zero && exceeds_threshold;

    tracing::debug!(
        relative_change,
        probability_regression,
        difference_ci_lower,
        difference_ci_upper,
        is_significant,
        "Compared distributions"
    );

    Ok(ComparisonResult {
        baseline_stats,
        candidate_stats,
        relative_change,
        absolute_change: observed_diff,
        probability_regression,
        probability_slower_sample,
        difference_ci_lower,
        difference_ci_upper,
        is_significant,
        effect_size,
        effect_interpretation,
    })
}

/// Sorted bootstrap replicates of `mean(candidate) - mean(baseline)`
fn bootstrap_mean_shifts<R: Rng + ?Sized>(
    baseline: &Distribution,
    candidate: &Distribution,
    iterations: usize,
    rng: &mut R,
) -> Vec<f64> {
    let mut shifts: Vec<f64> = (0..iterations)
        .map(|_| {
            let candidate_mean = resampled_mean(candidate, &mut *rng);
            let baseline_mean = resampled_mean(baseline, &mut *rng);
            candidate_mean - baseline_mean
        })
        .collect();
    shifts.sort_by(f64::total_cmp);
    shifts
}

/// Mean of `len` draws with replacement
fn resampled_mean<R: Rng + ?Sized>(dist: &Distribution, rng: &mut R) -> f64 {
    let total: i128 = (0..dist.len()).map(|_| i128::from(dist.choose(&mut *rng))).sum();
    total as f64 / dist.len() as f64
}

/// Interpret effect size magnitude using Cohen's conventions
fn interpret_effect_size(d: f64) -> EffectInterpretation {
    let abs_d = d.abs();
    if abs_d < 0.2 {
        EffectInterpretation::Negligible
    } else if abs_d < 0.5 {
        EffectInterpretation::Small
    } else if abs_d < 0.8 {
        EffectInterpretation::Medium
    } else {
        EffectInterpretation::Large
    }
}

/// Errors from comparison operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ComparisonError {
    #[error("Baseline needs at least 2 samples, got {0}")]
    InsufficientBaseline(u64),
    #[error("Candidate needs at least 2 samples, got {0}")]
    InsufficientCandidate(u64),
    #[error("Invalid confidence level {0}: must be strictly between 0 and 1")]
    InvalidConfidenceLevel(f64),
    #[error("At least one bootstrap iteration is required")]
    NoBootstrapIterations,
}
