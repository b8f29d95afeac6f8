//! Percentile Computation
//!
//! Percentiles are read straight off a [`Distribution`] by nearest rank using
//! its cumulative counts, so no sorting or copying of samples is needed.
//! Tail percentiles (p99, p999) still include every accepted sample; only
//! values the temporal filter rejected are missing.

use crate::distribution::Distribution;
use serde::{Deserialize, Serialize};

/// Standard percentiles to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: i64,
    /// 75th percentile
    pub p75: i64,
    /// 90th percentile
    pub p90: i64,
    /// 95th percentile
    pub p95: i64,
    /// 99th percentile
    pub p99: i64,
    /// 99.9th percentile
    pub p999: i64,
}

/// Compute a single percentile by nearest rank
///
/// `percentile` is clamped to `[0, 100]`; 0 yields the minimum and 100 the
/// maximum.
///
/// # Examples
///
/// ```ignore
/// # use quietbench_stats::{DistributionBuilder, compute_percentile};
/// let mut builder = DistributionBuilder::new();
/// for v in [1, 2, 3, 4, 5] {
///     builder.insert(v);
/// }
/// let dist = builder.build()?;
/// assert_eq!(compute_percentile(&dist, 50.0), 3);
/// ```
pub fn compute_percentile(dist: &Distribution, percentile: f64) -> i64 {
    let len = dist.len();
    let rank = nearest_rank(percentile, len).saturating_sub(1).min(len - 1);
    dist.value_at_rank(rank)
}

/// One-based nearest rank `ceil(percentile / 100 * len)`.
///
/// Percentiles such as 99.9 are not exact in binary, so a product that lands
/// within a few ulps of an integer is taken to be that integer.
fn nearest_rank(percentile: f64, len: u64) -> u64 {
    let exact = percentile.clamp(0.0, 100.0) * len as f64 / 100.0;
    let nearest = exact.round();
    let rank = if (exact - nearest).abs() <= exact.abs() * 4.0 * f64::EPSILON {
        nearest
    } else {
        exact.ceil()
    };
    // float-to-int `as` maps NaN to 0
    rank as u64
}

/// Compute all standard percentiles
pub fn compute_percentiles(dist: &Distribution) -> Percentiles {
    Percentiles {
        p50: compute_percentile(dist, 50.0),
        p75: compute_percentile(dist, 75.0),
        p90: compute_percentile(dist, 90.0),
        p95: compute_percentile(dist, 95.0),
        p99: compute_percentile(dist, 99.0),
        p999: compute_percentile(dist, 99.9),
    }
}
