//! Empirical Distributions
//!
//! A sorted, run-length-encoded histogram of observed integer values (typically
//! nanosecond durations), in two views over one allocation:
//!
//! - [`DistributionBuilder`] accepts insertions.
//! - [`Distribution`] is read-only and supports rank-based sampling.
//!
//! [`DistributionBuilder::build`] and [`Distribution::reset`] move the
//! allocation from one view to the other, so only one view is ever live.
//!
//! Derived distributions (difference, scaled ratio) are approximated by
//! resampling: the shorter input is iterated once per occurrence and the
//! longer input is sampled. This is linear in the shorter input rather than a
//! full convolution, and does not multiply rare outliers by the size of the
//! other side.

use crate::accumulator::Accumulator;
use rand::Rng;
use thiserror::Error;

const PAGE_SIZE: usize = 4096;

/// Bytes per bin: a value slot, a count slot and an end-rank slot.
const BIN_BYTES: usize = 3 * std::mem::size_of::<u64>();

/// Initial builder capacity: one page worth of bins.
pub const DEFAULT_CAPACITY: usize = PAGE_SIZE / BIN_BYTES;

/// Errors from finalizing a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DistributionError {
    /// A distribution needs at least one observation
    #[error("cannot build a distribution with no observations")]
    Empty,
}

/// Single allocation laid out as `[values | counts | end_ranks]`.
///
/// Values are stored as the bit pattern of the `i64`.
#[derive(Debug, Clone)]
struct BinStorage {
    slots: Box<[u64]>,
    capacity: usize,
}

impl BinStorage {
    fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "distribution capacity must be at least 1");
        Self {
            slots: vec![0; 3 * capacity].into_boxed_slice(),
            capacity,
        }
    }

    #[inline]
    fn value(&self, idx: usize) -> i64 {
        self.slots[idx] as i64
    }

    #[inline]
    fn set_value(&mut self, idx: usize, value: i64) {
        self.slots[idx] = value as u64;
    }

    #[inline]
    fn count(&self, idx: usize) -> u64 {
        self.slots[self.capacity + idx]
    }

    #[inline]
    fn count_mut(&mut self, idx: usize) -> &mut u64 {
        &mut self.slots[self.capacity + idx]
    }

    #[inline]
    fn end_rank(&self, idx: usize) -> u64 {
        self.slots[2 * self.capacity + idx]
    }

    fn end_ranks(&self, num_bins: usize) -> &[u64] {
        let start = 2 * self.capacity;
        &self.slots[start..start + num_bins]
    }

    fn search(&self, num_bins: usize, value: i64) -> Result<usize, usize> {
        self.slots[..num_bins].binary_search_by(|&bits| (bits as i64).cmp(&value))
    }

    fn bin(&self, idx: usize) -> (i64, u64) {
        (self.value(idx), self.count(idx))
    }
}

/// Growable sorted histogram accepting insertions.
#[derive(Debug, Clone)]
pub struct DistributionBuilder {
    storage: BinStorage,
    num_bins: usize,
}

impl Default for DistributionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionBuilder {
    /// Empty builder with [`DEFAULT_CAPACITY`] bins.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Empty builder with room for `capacity` distinct values.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: BinStorage::new(capacity),
            num_bins: 0,
        }
    }

    /// Number of distinct values observed
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Number of bins the current allocation can hold
    pub fn capacity(&self) -> usize {
        self.storage.capacity
    }

    /// Whether nothing has been inserted
    pub fn is_empty(&self) -> bool {
        self.num_bins == 0
    }

    /// Total number of insertions
    pub fn len(&self) -> u64 {
        self.bins().map(|(_, count)| count).sum()
    }

    /// `(value, count)` pairs in increasing value order
    pub fn bins(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        (0..self.num_bins).map(|idx| self.storage.bin(idx))
    }

    /// Record one occurrence of `value`.
    pub fn insert(&mut self, value: i64) {
        let pos = match self.storage.search(self.num_bins, value) {
            Ok(idx) => {
                *self.storage.count_mut(idx) += 1;
                return;
            }
            Err(pos) => pos,
        };

        if self.num_bins < self.storage.capacity {
            let cap = self.storage.capacity;
            let slots = &mut self.storage.slots;
            slots.copy_within(pos..self.num_bins, pos + 1);
            slots.copy_within(cap + pos..cap + self.num_bins, cap + pos + 1);
        } else {
            self.grow_around(pos);
        }

        self.storage.set_value(pos, value);
        *self.storage.count_mut(pos) = 1;
        self.num_bins += 1;
    }

    /// Double the allocation, leaving slot `pos` free for a new bin.
    fn grow_around(&mut self, pos: usize) {
        let old = &self.storage;
        let (old_cap, n) = (old.capacity, self.num_bins);
        let mut grown = BinStorage::new(old_cap * 2);
        let new_cap = grown.capacity;

        grown.slots[..pos].copy_from_slice(&old.slots[..pos]);
        grown.slots[pos + 1..n + 1].copy_from_slice(&old.slots[pos..n]);
        grown.slots[new_cap..new_cap + pos].copy_from_slice(&old.slots[old_cap..old_cap + pos]);
        grown.slots[new_cap + pos + 1..new_cap + n + 1]
            .copy_from_slice(&old.slots[old_cap + pos..old_cap + n]);

        tracing::trace!(from = old_cap, to = new_cap, "distribution storage grown");
        self.storage = grown;
    }

    /// Finalize into a queryable [`Distribution`].
    pub fn build(self) -> Result<Distribution, DistributionError> {
        if self.num_bins == 0 {
            return Err(DistributionError::Empty);
        }
        Ok(self.finish())
    }

    /// Release the allocation without building.
    pub fn discard(self) {}

    /// Distribution of `dist × factor`.
    ///
    /// The builder must be empty; it is reallocated if it cannot hold every
    /// bin of `dist`.
    ///
    /// # Panics
    /// If the builder is not empty, or a scaled value overflows `i64`.
    pub fn scale(mut self, factor: i64, dist: &Distribution) -> Distribution {
        assert!(self.is_empty(), "derived distributions need an empty builder");

        if factor == 0 {
            self.storage.set_value(0, 0);
            *self.storage.count_mut(0) = dist.len();
            self.num_bins = 1;
            return self.finish();
        }

        let n = dist.num_bins();
        if self.storage.capacity < n {
            self.storage = BinStorage::new(n);
        }
        for (idx, (value, count)) in dist.bins().enumerate() {
            let scaled = value
                .checked_mul(factor)
                .unwrap_or_else(|| panic!("scaling {value} by {factor} overflows i64"));
            // negative factors reverse the order
            let slot = if factor > 0 { idx } else { n - 1 - idx };
            self.storage.set_value(slot, scaled);
            *self.storage.count_mut(slot) = count;
        }
        self.num_bins = n;
        self.finish()
    }

    /// Approximate distribution of `left - right`, by resampling.
    ///
    /// Differences saturate at the `i64` range.
    ///
    /// # Panics
    /// If the builder is not empty.
    pub fn subtract<R: Rng + ?Sized>(
        self,
        left: &Distribution,
        right: &Distribution,
        rng: &mut R,
    ) -> Distribution {
        self.resample(left, right, rng, |l, r| l.saturating_sub(r))
    }

    /// Approximate distribution of `(num × factor) / denom`, by resampling.
    ///
    /// Computed in 128-bit arithmetic and saturated to the `i64` range. A zero
    /// denominator saturates toward the sign of the scaled numerator.
    ///
    /// # Panics
    /// If the builder is not empty.
    pub fn scaled_div<R: Rng + ?Sized>(
        self,
        num: &Distribution,
        factor: i64,
        denom: &Distribution,
        rng: &mut R,
    ) -> Distribution {
        self.resample(num, denom, rng, move |n, d| scaled_quotient(n, factor, d))
    }

    /// Iterate every occurrence of the shorter input, pairing each with one
    /// sample drawn from the longer input.
    fn resample<R, F>(
        mut self,
        left: &Distribution,
        right: &Distribution,
        rng: &mut R,
        combine: F,
    ) -> Distribution
    where
        R: Rng + ?Sized,
        F: Fn(i64, i64) -> i64,
    {
        assert!(self.is_empty(), "derived distributions need an empty builder");

        if left.len() <= right.len() {
            for (value, count) in left.bins() {
                for _ in 0..count {
                    let other = right.choose(rng);
                    self.insert(combine(value, other));
                }
            }
        } else {
            for (value, count) in right.bins() {
                for _ in 0..count {
                    let other = left.choose(rng);
                    self.insert(combine(other, value));
                }
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Distribution {
        debug_assert!(self.num_bins > 0);
        let end_start = 2 * self.storage.capacity;
        let mut running = 0u64;
        for idx in 0..self.num_bins {
            running += self.storage.count(idx);
            self.storage.slots[end_start + idx] = running;
        }
        Distribution {
            storage: self.storage,
            num_bins: self.num_bins,
        }
    }
}

fn scaled_quotient(numerator: i64, factor: i64, denominator: i64) -> i64 {
    let scaled = i128::from(numerator) * i128::from(factor);
    let quotient = match (denominator, scaled.signum()) {
        (0, 1) => i128::MAX,
        (0, -1) => i128::MIN,
        (0, _) => 0,
        (d, _) => scaled / i128::from(d),
    };
    quotient.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Read-only empirical distribution with at least one observation.
#[derive(Debug, Clone)]
pub struct Distribution {
    storage: BinStorage,
    num_bins: usize,
}

#[allow(clippy::len_without_is_empty)] // never empty
impl Distribution {
    /// Total number of observations
    pub fn len(&self) -> u64 {
        self.storage.end_rank(self.num_bins - 1)
    }

    /// Number of distinct values
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Bin capacity of the underlying allocation
    pub fn capacity(&self) -> usize {
        self.storage.capacity
    }

    /// `(value, count)` pairs in increasing value order
    pub fn bins(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        (0..self.num_bins).map(|idx| self.storage.bin(idx))
    }

    /// Smallest observed value
    pub fn min(&self) -> i64 {
        self.storage.value(0)
    }

    /// Largest observed value
    pub fn max(&self) -> i64 {
        self.storage.value(self.num_bins - 1)
    }

    /// Value at `rank` in the sorted sequence of all observations.
    ///
    /// # Panics
    /// If `rank >= self.len()`.
    pub fn value_at_rank(&self, rank: u64) -> i64 {
        assert!(rank < self.len(), "rank {rank} out of range");
        let idx = self
            .storage
            .end_ranks(self.num_bins)
            .partition_point(|&end| end <= rank);
        self.storage.value(idx)
    }

    /// Draw one observation, with probability proportional to its count.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let rank = rng.gen_range(0..self.len());
        self.value_at_rank(rank)
    }

    /// Number of observations less than or equal to `value`
    pub fn count_at_most(&self, value: i64) -> u64 {
        match self.storage.search(self.num_bins, value) {
            Ok(idx) => self.storage.end_rank(idx),
            Err(0) => 0,
            Err(idx) => self.storage.end_rank(idx - 1),
        }
    }

    /// Mean of all observations. The sum is exact; only the final division rounds.
    pub fn mean(&self) -> f64 {
        let mut total = Accumulator::new();
        for (value, count) in self.bins() {
            add_product(&mut total, value, count);
        }
        total.to_f64() / self.len() as f64
    }

    /// Hand the allocation back as an empty builder.
    pub fn reset(self) -> DistributionBuilder {
        DistributionBuilder {
            storage: self.storage,
            num_bins: 0,
        }
    }

    /// Release the allocation.
    pub fn finalize(self) {}
}

/// Add `value * count` to `total` without rounding the product.
///
/// The exact `i128` product is split into 48-bit limbs, each of which is a
/// double with no rounding.
fn add_product(total: &mut Accumulator, value: i64, count: u64) {
    const LIMB_BITS: i32 = 48;
    const LIMB_MASK: i128 = (1 << LIMB_BITS) - 1;

    let product = i128::from(value) * i128::from(count);
    let low = product & LIMB_MASK;
    let mid = (product >> LIMB_BITS) & LIMB_MASK;
    let high = product >> (2 * LIMB_BITS);

    total.add(low as f64);
    total.add(mid as f64 * 2f64.powi(LIMB_BITS));
    total.add(high as f64 * 2f64.powi(2 * LIMB_BITS));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn build_from(values: &[i64]) -> Distribution {
        let mut builder = DistributionBuilder::new();
        for &v in values {
            builder.insert(v);
        }
        builder.build().unwrap()
    }

    fn bins(dist: &Distribution) -> Vec<(i64, u64)> {
        dist.bins().collect()
    }

    #[test]
    fn test_default_capacity_is_one_page() {
        assert_eq!(DEFAULT_CAPACITY, 170);
        assert_eq!(DistributionBuilder::new().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_insertion_order() {
        let dist = build_from(&[5, 3, 5, 1, 3, 3]);
        assert_eq!(bins(&dist), vec![(1, 1), (3, 3), (5, 2)]);
        assert_eq!(dist.len(), 6);
        assert_eq!(dist.num_bins(), 3);
        assert_eq!(dist.min(), 1);
        assert_eq!(dist.max(), 5);
    }

    #[test]
    fn test_growth_doubles_capacity() {
        let mut builder = DistributionBuilder::with_capacity(1);
        for v in (0..100).rev() {
            builder.insert(v * 7 - 300);
        }
        builder.insert(-300);
        assert_eq!(builder.capacity(), 128);
        assert_eq!(builder.num_bins(), 100);
        assert_eq!(builder.len(), 101);

        let dist = builder.build().unwrap();
        let values: Vec<i64> = dist.bins().map(|(v, _)| v).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bins(&dist)[0], (-300, 2));
    }

    #[test]
    fn test_growth_inserting_in_the_middle() {
        let mut builder = DistributionBuilder::with_capacity(2);
        builder.insert(10);
        builder.insert(30);
        builder.insert(20);
        builder.insert(20);
        let dist = builder.build().unwrap();
        assert_eq!(dist.capacity(), 4);
        assert_eq!(bins(&dist), vec![(10, 1), (20, 2), (30, 1)]);
    }

    #[test]
    fn test_extreme_values() {
        let dist = build_from(&[i64::MAX, i64::MIN, 0, -1, i64::MIN]);
        assert_eq!(
            bins(&dist),
            vec![(i64::MIN, 2), (-1, 1), (0, 1), (i64::MAX, 1)]
        );
    }

    #[test]
    fn test_build_empty_fails() {
        let result = DistributionBuilder::new().build();
        assert_eq!(result.unwrap_err(), DistributionError::Empty);
    }

    #[test]
    fn test_build_reset_round_trip() {
        let mut builder = DistributionBuilder::with_capacity(4);
        for v in [9, 1, 4, 4, 7, 2] {
            builder.insert(v);
        }
        let capacity = builder.capacity();

        let mut builder = builder.build().unwrap().reset();
        assert_eq!(builder.num_bins(), 0);
        assert!(builder.is_empty());
        assert_eq!(builder.capacity(), capacity);

        builder.insert(3);
        assert_eq!(bins(&builder.build().unwrap()), vec![(3, 1)]);
    }

    #[test]
    fn test_value_at_rank() {
        let dist = build_from(&[1, 1, 3, 5, 5, 5]);
        let by_rank: Vec<i64> = (0..dist.len()).map(|r| dist.value_at_rank(r)).collect();
        assert_eq!(by_rank, vec![1, 1, 3, 5, 5, 5]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_value_at_rank_out_of_range() {
        build_from(&[1]).value_at_rank(1);
    }

    #[test]
    fn test_count_at_most() {
        let dist = build_from(&[1, 1, 3, 5, 5, 5]);
        assert_eq!(dist.count_at_most(0), 0);
        assert_eq!(dist.count_at_most(1), 2);
        assert_eq!(dist.count_at_most(2), 2);
        assert_eq!(dist.count_at_most(5), 6);
        assert_eq!(dist.count_at_most(100), 6);
    }

    #[test]
    fn test_mean() {
        let dist = build_from(&[1, 1, 3, 5, 5, 5]);
        assert!((dist.mean() - 20.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_product_is_added_exactly() {
        // (2^53 + 1) * 3 needs 55 bits; a rounded product would be 3 short
        let value = (1i64 << 53) + 1;
        let mut total = Accumulator::new();
        add_product(&mut total, value, 3);
        total.add(-3.0 * 2f64.powi(53));
        assert_eq!(total.to_f64(), 3.0);

        let mut total = Accumulator::new();
        add_product(&mut total, i64::MIN, u64::MAX);
        add_product(&mut total, i64::MAX, u64::MAX);
        // (MIN + MAX) * u64::MAX = -u64::MAX
        assert_eq!(total.to_f64(), -(u64::MAX as f64));
    }

    #[test]
    fn test_mean_of_large_repeated_values() {
        let big = (1i64 << 53) + 1;
        let dist = build_from(&[big, big, big, -(1i64 << 53), -(1i64 << 53), -(1i64 << 53)]);
        assert_eq!(dist.mean(), 0.5);
    }

    #[test]
    fn test_choose_follows_counts() {
        let dist = build_from(&[10, 20, 20, 20]);
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 20_000;
        let twenties = (0..draws).filter(|_| dist.choose(&mut rng) == 20).count();
        let share = twenties as f64 / draws as f64;
        assert!((share - 0.75).abs() < 0.02, "share {share}");
    }

    #[test]
    fn test_scale_by_negative_one() {
        let dist = build_from(&[1, 1, 3]);
        let scaled = DistributionBuilder::new().scale(-1, &dist);
        assert_eq!(bins(&scaled), vec![(-3, 1), (-1, 2)]);
    }

    #[test]
    fn test_scale_by_zero_collapses() {
        let dist = build_from(&[1, 1, 3, 8]);
        let scaled = DistributionBuilder::new().scale(0, &dist);
        assert_eq!(bins(&scaled), vec![(0, 4)]);
    }

    #[test]
    fn test_scale_reallocates_small_builder() {
        let dist = build_from(&[1, 2, 3, 4, 5, 5]);
        let scaled = DistributionBuilder::with_capacity(1).scale(3, &dist);
        assert_eq!(
            bins(&scaled),
            vec![(3, 1), (6, 1), (9, 1), (12, 1), (15, 2)]
        );
        assert_eq!(scaled.len(), 6);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_scale_overflow_panics() {
        let dist = build_from(&[i64::MAX]);
        DistributionBuilder::new().scale(2, &dist);
    }

    #[test]
    #[should_panic(expected = "empty builder")]
    fn test_derived_requires_empty_builder() {
        let dist = build_from(&[1]);
        let mut builder = DistributionBuilder::new();
        builder.insert(5);
        builder.scale(2, &dist);
    }

    #[test]
    fn test_subtract_constants() {
        let left = build_from(&[10; 100]);
        let right = build_from(&[3; 50]);
        let mut rng = StdRng::seed_from_u64(1);

        let diff = DistributionBuilder::new().subtract(&left, &right, &mut rng);
        assert_eq!(bins(&diff), vec![(7, 50)]);

        let diff = DistributionBuilder::new().subtract(&right, &left, &mut rng);
        assert_eq!(bins(&diff), vec![(-7, 50)]);
    }

    #[test]
    fn test_subtract_is_plausible() {
        let left: Vec<i64> = (0..2000).map(|i| 1000 + i % 100).collect();
        let right: Vec<i64> = (0..500).map(|i| 400 + i % 50).collect();
        let (left, right) = (build_from(&left), build_from(&right));
        let mut rng = StdRng::seed_from_u64(42);

        let diff = DistributionBuilder::new().subtract(&left, &right, &mut rng);
        assert_eq!(diff.len(), 500);
        assert!(diff.min() >= 1000 - 449);
        assert!(diff.max() <= 1099 - 400);

        // E[left] - E[right] = 1049.5 - 424.5
        assert!((diff.mean() - 625.0).abs() < 10.0, "mean {}", diff.mean());
    }

    #[test]
    fn test_scaled_div() {
        let num = build_from(&[200; 10]);
        let denom = build_from(&[100; 20]);
        let mut rng = StdRng::seed_from_u64(3);

        let ratio = DistributionBuilder::new().scaled_div(&num, 1000, &denom, &mut rng);
        assert_eq!(bins(&ratio), vec![(2000, 10)]);

        // longer numerator: iterate the denominator
        let ratio = DistributionBuilder::new().scaled_div(&denom, 1000, &num, &mut rng);
        assert_eq!(bins(&ratio), vec![(500, 10)]);
    }

    #[test]
    fn test_scaled_quotient_edges() {
        assert_eq!(scaled_quotient(5, 10, 0), i64::MAX);
        assert_eq!(scaled_quotient(-5, 10, 0), i64::MIN);
        assert_eq!(scaled_quotient(0, 10, 0), 0);
        assert_eq!(scaled_quotient(i64::MAX, i64::MAX, 1), i64::MAX);
        assert_eq!(scaled_quotient(i64::MAX, 4, 8), i64::MAX / 2);
        assert_eq!(scaled_quotient(7, 1, -2), -3);
    }

    proptest! {
        #[test]
        fn prop_sorted_and_counted(values in prop::collection::vec(-50i64..50, 1..300), cap in 1usize..8) {
            let mut builder = DistributionBuilder::with_capacity(cap);
            for &v in &values {
                builder.insert(v);
            }
            let mut expected: BTreeMap<i64, u64> = BTreeMap::new();
            for &v in &values {
                *expected.entry(v).or_default() += 1;
            }

            let dist = builder.build().unwrap();
            let got: Vec<(i64, u64)> = dist.bins().collect();
            prop_assert_eq!(got, expected.into_iter().collect::<Vec<_>>());
            prop_assert_eq!(dist.len(), values.len() as u64);
        }

        #[test]
        fn prop_choose_returns_observed_value(values in prop::collection::vec(any::<i64>(), 1..50), seed in any::<u64>()) {
            let dist = build_from(&values);
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..20 {
                let drawn = dist.choose(&mut rng);
                prop_assert!(values.contains(&drawn));
            }
        }
    }
}
