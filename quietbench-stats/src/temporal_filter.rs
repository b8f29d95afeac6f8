//! Temporal Outlier Filter
//!
//! Online classifier for scheduler-induced outliers in a stream of timing
//! samples. A preemption inflates one sample without affecting its neighbours,
//! so within a sliding window of `N` samples at most one value is assumed to be
//! corrupted (the *single-outlier hypothesis*).
//!
//! The filter tracks the window minimum and the largest value not currently
//! classified as an outlier (`max_normal`). A new sample is flagged when it is
//! the isolated maximum and exceeds
//!
//! ```text
//! upper_tolerance = max_normal + ceil((max_normal - min) * tolerance)
//! ```
//!
//! Classifications are provisional. When later samples show that a flagged
//! value was legitimate (a second occurrence of it, or a wider spread of
//! normal values), the filter reports it through
//! [`FilterOutcome::previous_not_outlier`] so the caller can still keep it.

use std::cmp::Ordering;

/// Default tolerance multiplier applied to the spread of normal values.
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Classification produced by [`TemporalFilter::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterOutcome {
    /// The applied sample is an outlier and should be excluded (for now)
    pub current_is_outlier: bool,
    /// A previously flagged sample turned out to be legitimate
    pub previous_not_outlier: bool,
    /// The rehabilitated sample, valid when `previous_not_outlier` is set
    pub previous_input: i64,
}

/// Sliding-window outlier classifier over the last `N` samples.
///
/// `N` must be at least 3; the window is seeded in full at construction, so
/// there is no partially filled state.
#[derive(Debug, Clone, Copy)]
pub struct TemporalFilter<const N: usize> {
    window: [i64; N],
    /// Oldest entry, overwritten next
    next_idx: usize,
    min: i64,
    min_count: usize,
    max_normal: i64,
    max_normal_count: usize,
    max: i64,
    upper_tolerance: i64,
    outlier_idx: Option<usize>,
    tolerance: f64,
}

impl<const N: usize> TemporalFilter<N> {
    /// Seed a filter with a full window, using [`DEFAULT_TOLERANCE`].
    pub fn new(window: [i64; N]) -> Self {
        Self::with_tolerance(window, DEFAULT_TOLERANCE)
    }

    /// Seed a filter with a full window and a custom tolerance multiplier.
    ///
    /// An isolated maximum in the seed window is flagged when it exceeds the
    /// tolerance computed from the remaining values.
    ///
    /// # Panics
    /// If `tolerance` is negative or not finite.
    pub fn with_tolerance(window: [i64; N], tolerance: f64) -> Self {
        const { assert!(N >= 3, "temporal filter window needs at least 3 samples") };
        assert!(
            tolerance.is_finite() && tolerance >= 0.0,
            "tolerance must be finite and non-negative, got {tolerance}"
        );

        let mut filter = Self {
            window,
            next_idx: 0,
            min: 0,
            min_count: 0,
            max_normal: 0,
            max_normal_count: 0,
            max: 0,
            upper_tolerance: 0,
            outlier_idx: None,
            tolerance,
        };
        filter.rescan_min();
        filter.seed_max();
        filter
    }

    /// Smallest value in the window
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Largest value in the window, including a flagged outlier
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Largest value in the window not classified as an outlier
    pub fn max_normal(&self) -> i64 {
        self.max_normal
    }

    /// Values above this bound are outlier candidates
    pub fn upper_tolerance(&self) -> i64 {
        self.upper_tolerance
    }

    /// The currently flagged outlier, if any
    pub fn outlier(&self) -> Option<i64> {
        self.outlier_idx.map(|idx| self.window[idx])
    }

    /// Window contents in storage (not arrival) order
    pub fn window(&self) -> &[i64; N] {
        &self.window
    }

    /// Tolerance multiplier
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Classify `input`, then let it replace the oldest sample in the window.
    pub fn apply(&mut self, input: i64) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        if input < self.min {
            self.min = input;
            self.min_count = 1;
            self.update_tolerance();
            self.absolve_within_tolerance(&mut outcome);
        } else if input == self.min {
            self.min_count += 1;
        }

        let mut is_outlier = false;
        match input.cmp(&self.max) {
            Ordering::Greater => {
                // Only one outlier per window: a larger value displaces the
                // current candidate.
                if self.outlier_idx.is_some() {
                    self.absolve(&mut outcome, 1);
                }
                self.max = input;
                if input > self.upper_tolerance {
                    is_outlier = true;
                } else {
                    self.max_normal = input;
                    self.max_normal_count = 1;
                    self.update_tolerance();
                }
            }
            Ordering::Equal => {
                if self.outlier_idx.is_some() {
                    // Two occurrences of one value cannot both be outliers.
                    self.absolve(&mut outcome, 2);
                } else {
                    self.max_normal_count += 1;
                }
            }
            Ordering::Less => match input.cmp(&self.max_normal) {
                Ordering::Greater => {
                    self.max_normal = input;
                    self.max_normal_count = 1;
                    self.update_tolerance();
                    self.absolve_within_tolerance(&mut outcome);
                }
                Ordering::Equal => self.max_normal_count += 1,
                Ordering::Less => {}
            },
        }

        self.replace_oldest(input, is_outlier);
        outcome.current_is_outlier = is_outlier;
        outcome
    }

    /// Reclassify the flagged outlier (the unique maximum) as normal.
    ///
    /// `count` is the number of normal occurrences of that value afterwards.
    fn absolve(&mut self, outcome: &mut FilterOutcome, count: usize) {
        debug_assert!(self.outlier_idx.is_some());
        self.outlier_idx = None;
        self.max_normal = self.max;
        self.max_normal_count = count;
        self.update_tolerance();

        outcome.previous_not_outlier = true;
        outcome.previous_input = self.max;
    }

    fn absolve_within_tolerance(&mut self, outcome: &mut FilterOutcome) {
        if self.outlier_idx.is_some() && self.max <= self.upper_tolerance {
            self.absolve(outcome, 1);
        }
    }

    /// Overwrite the oldest entry with `input` and repair the statistics.
    fn replace_oldest(&mut self, input: i64, is_outlier: bool) {
        let slot = self.next_idx;
        let evicted = self.window[slot];
        let evicted_was_outlier = self.outlier_idx == Some(slot);
        // a new outlier always displaces the previous one first
        debug_assert!(!(is_outlier && evicted_was_outlier));

        self.window[slot] = input;
        self.next_idx = (slot + 1) % N;
        if is_outlier {
            self.outlier_idx = Some(slot);
        }

        if evicted_was_outlier {
            // The outlier is never the minimum, and every remaining value
            // is normal.
            self.outlier_idx = None;
            self.max = self.max_normal;
            return;
        }

        if evicted == self.min {
            self.min_count -= 1;
        }
        if evicted == self.max_normal {
            self.max_normal_count -= 1;
        }

        let min_gone = self.min_count == 0;
        if min_gone {
            tracing::trace!(evicted, "window minimum evicted, rescanning");
            self.rescan_min();
        }
        if self.max_normal_count == 0 {
            tracing::trace!(evicted, "window max_normal evicted, rescanning");
            self.rescan_max();
        } else if min_gone {
            self.update_tolerance();
        }
    }

    fn rescan_min(&mut self) {
        let min = self.window.iter().copied().fold(i64::MAX, i64::min);
        self.min = min;
        self.min_count = self.window.iter().filter(|&&v| v == min).count();
    }

    /// Recompute `max_normal`, `max` and the tolerance, keeping the recorded
    /// outlier. Rescans never flag a new outlier.
    fn rescan_max(&mut self) {
        let mut max_normal = i64::MIN;
        let mut count = 0;
        for (idx, &value) in self.window.iter().enumerate() {
            if Some(idx) == self.outlier_idx {
                continue;
            }
            match value.cmp(&max_normal) {
                Ordering::Greater => {
                    max_normal = value;
                    count = 1;
                }
                Ordering::Equal => count += 1,
                Ordering::Less => {}
            }
        }

        self.max_normal = max_normal;
        self.max_normal_count = count;
        self.max = match self.outlier_idx {
            Some(idx) => self.window[idx],
            None => max_normal,
        };
        self.update_tolerance();
    }

    /// Initial scan: an isolated maximum is a provisional outlier until the
    /// tolerance of the remaining values is known.
    fn seed_max(&mut self) {
        let (mut max, mut max_count, mut max_idx) = (i64::MIN, 0, 0);
        let (mut second, mut second_count) = (i64::MIN, 0);

        for (idx, &value) in self.window.iter().enumerate() {
            match value.cmp(&max) {
                Ordering::Greater => {
                    if max_count > 0 {
                        second = max;
                        second_count = max_count;
                    }
                    max = value;
                    max_count = 1;
                    max_idx = idx;
                }
                Ordering::Equal => max_count += 1,
                Ordering::Less => match value.cmp(&second) {
                    Ordering::Greater => {
                        second = value;
                        second_count = 1;
                    }
                    Ordering::Equal => second_count += 1,
                    Ordering::Less => {}
                },
            }
        }

        self.max = max;
        self.outlier_idx = None;
        if max_count == 1 {
            self.max_normal = second;
            self.max_normal_count = second_count;
            self.update_tolerance();
            if max > self.upper_tolerance {
                self.outlier_idx = Some(max_idx);
                return;
            }
        }
        self.max_normal = max;
        self.max_normal_count = max_count;
        self.update_tolerance();
    }

    fn update_tolerance(&mut self) {
        self.upper_tolerance = tolerance_bound(self.min, self.max_normal, self.tolerance);
    }
}

/// `max_normal + ceil((max_normal - min) * tolerance)`, saturating.
fn tolerance_bound(min: i64, max_normal: i64, tolerance: f64) -> i64 {
    let spread = max_normal.abs_diff(min) as f64;
    // float-to-int `as` saturates
    let margin = (spread * tolerance).ceil() as i64;
    max_normal.saturating_add(margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Brute-force check of every cached statistic against the window.
    fn check_invariants<const N: usize>(filter: &TemporalFilter<N>) {
        let window = &filter.window;
        let min = *window.iter().min().unwrap();
        let max = *window.iter().max().unwrap();
        assert_eq!(filter.min, min);
        assert_eq!(filter.min_count, window.iter().filter(|&&v| v == min).count());
        assert_eq!(filter.max, max);

        let normals: Vec<i64> = window
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != filter.outlier_idx)
            .map(|(_, &v)| v)
            .collect();
        let max_normal = *normals.iter().max().unwrap();
        assert_eq!(filter.max_normal, max_normal);
        assert_eq!(
            filter.max_normal_count,
            normals.iter().filter(|&&v| v == max_normal).count()
        );

        assert_eq!(
            filter.upper_tolerance,
            tolerance_bound(filter.min, filter.max_normal, filter.tolerance)
        );
        assert!(filter.min <= filter.max_normal && filter.max_normal <= filter.max);
        assert!(filter.max_normal <= filter.upper_tolerance);

        let above: Vec<usize> = (0..N)
            .filter(|&idx| window[idx] > filter.upper_tolerance)
            .collect();
        assert!(above.len() <= 1, "window {window:?} has {above:?} above tolerance");
        match filter.outlier_idx {
            Some(idx) => {
                assert_eq!(above, vec![idx]);
                assert_eq!(window[idx], filter.max);
            }
            None => {
                assert!(above.is_empty());
                assert_eq!(filter.max, filter.max_normal);
            }
        }
    }

    #[test]
    fn test_seed_uniform_window() {
        let filter = TemporalFilter::new([10; 10]);
        assert_eq!(filter.min(), 10);
        assert_eq!(filter.max(), 10);
        assert_eq!(filter.max_normal(), 10);
        assert_eq!(filter.upper_tolerance(), 10);
        assert_eq!(filter.outlier(), None);
        check_invariants(&filter);
    }

    #[test]
    fn test_seed_isolated_max_within_tolerance() {
        let filter = TemporalFilter::new([1, 2, 3, 4, 5]);
        assert_eq!(filter.outlier(), None);
        assert_eq!(filter.max_normal(), 5);
        assert_eq!(filter.upper_tolerance(), 9);
        check_invariants(&filter);
    }

    #[test]
    fn test_seed_isolated_max_flagged() {
        let filter = TemporalFilter::new([10, 11, 10, 12, 100]);
        assert_eq!(filter.outlier(), Some(100));
        assert_eq!(filter.max_normal(), 12);
        assert_eq!(filter.upper_tolerance(), 14);
        check_invariants(&filter);
    }

    #[test]
    fn test_rehabilitation_on_repeat() {
        let mut filter = TemporalFilter::new([10; 10]);
        for _ in 0..8 {
            assert_eq!(filter.apply(10), FilterOutcome::default());
        }

        let first = filter.apply(50);
        assert!(first.current_is_outlier);
        assert!(!first.previous_not_outlier);

        let second = filter.apply(50);
        assert!(!second.current_is_outlier);
        assert!(second.previous_not_outlier);
        assert_eq!(second.previous_input, 50);
        assert_eq!(filter.outlier(), None);
        assert_eq!(filter.max_normal(), 50);
        check_invariants(&filter);
    }

    #[test]
    fn test_new_minimum_absolves() {
        let mut filter = TemporalFilter::new([10, 10, 12, 10, 40]);
        assert_eq!(filter.outlier(), Some(40));

        let outcome = filter.apply(-20);
        assert!(!outcome.current_is_outlier);
        assert!(outcome.previous_not_outlier);
        assert_eq!(outcome.previous_input, 40);
        assert_eq!(filter.min(), -20);
        assert_eq!(filter.outlier(), None);
        check_invariants(&filter);
    }

    #[test]
    fn test_new_max_normal_absolves() {
        let mut filter = TemporalFilter::new([10, 10, 12, 10, 40]);
        let outcome = filter.apply(30);
        assert!(!outcome.current_is_outlier);
        assert!(outcome.previous_not_outlier);
        assert_eq!(outcome.previous_input, 40);
        assert_eq!(filter.max_normal(), 40);
        check_invariants(&filter);
    }

    #[test]
    fn test_new_max_normal_without_absolution() {
        let mut filter = TemporalFilter::new([10, 10, 12, 10, 400]);
        let outcome = filter.apply(11);
        assert_eq!(outcome, FilterOutcome::default());
        assert_eq!(filter.outlier(), Some(400));
        check_invariants(&filter);
    }

    #[test]
    fn test_larger_value_displaces_outlier() {
        let mut filter = TemporalFilter::new([10, 10, 10, 10, 50]);
        assert_eq!(filter.outlier(), Some(50));

        let outcome = filter.apply(1000);
        assert!(outcome.current_is_outlier);
        assert!(outcome.previous_not_outlier);
        assert_eq!(outcome.previous_input, 50);
        assert_eq!(filter.outlier(), Some(1000));
        assert_eq!(filter.max_normal(), 50);
        check_invariants(&filter);
    }

    #[test]
    fn test_larger_value_within_tolerance() {
        let mut filter = TemporalFilter::new([10, 20, 10, 20, 10]);
        let outcome = filter.apply(25);
        assert_eq!(outcome, FilterOutcome::default());
        assert_eq!(filter.max_normal(), 25);
        check_invariants(&filter);
    }

    #[test]
    fn test_evicting_outlier() {
        let mut filter = TemporalFilter::new([50, 10, 10, 10, 10]);
        assert_eq!(filter.outlier(), Some(50));

        let outcome = filter.apply(10);
        assert_eq!(outcome, FilterOutcome::default());
        assert_eq!(filter.outlier(), None);
        assert_eq!(filter.max(), 10);
        check_invariants(&filter);
    }

    #[test]
    fn test_evicting_minimum_rescans() {
        let mut filter = TemporalFilter::new([1, 5, 5, 5, 5]);
        assert_eq!(filter.upper_tolerance(), 9);

        filter.apply(5);
        assert_eq!(filter.min(), 5);
        assert_eq!(filter.upper_tolerance(), 5);
        check_invariants(&filter);
    }

    #[test]
    fn test_evicting_max_normal_keeps_outlier() {
        let mut filter = TemporalFilter::new([12, 10, 10, 10, 100]);
        filter.apply(10);
        assert_eq!(filter.max_normal(), 10);
        assert_eq!(filter.outlier(), Some(100));
        assert_eq!(filter.upper_tolerance(), 10);
        check_invariants(&filter);
    }

    #[test]
    fn test_extreme_values() {
        let mut filter = TemporalFilter::new([i64::MIN, 0, 0, 0]);
        assert_eq!(filter.upper_tolerance(), i64::MAX);

        filter.apply(i64::MIN);
        filter.apply(i64::MAX);
        check_invariants(&filter);
        filter.apply(i64::MAX);
        filter.apply(i64::MIN);
        check_invariants(&filter);
    }

    #[test]
    fn test_zero_tolerance() {
        let mut filter = TemporalFilter::with_tolerance([10, 20, 10, 20], 0.0);
        assert_eq!(filter.upper_tolerance(), 20);
        assert!(filter.apply(21).current_is_outlier);
        check_invariants(&filter);
    }

    #[test]
    #[should_panic(expected = "tolerance")]
    fn test_negative_tolerance_panics() {
        TemporalFilter::with_tolerance([1, 2, 3], -0.5);
    }

    fn spiky() -> impl Strategy<Value = i64> {
        prop_oneof![
            8 => 1_000i64..1_020,
            1 => 900i64..1_000,
            1 => 1_000i64..50_000,
        ]
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_for_spiky_streams(
            seed in prop::array::uniform8(spiky()),
            inputs in prop::collection::vec(spiky(), 0..200),
        ) {
            let mut filter = TemporalFilter::new(seed);
            check_invariants(&filter);
            for input in inputs {
                filter.apply(input);
                check_invariants(&filter);
            }
        }

        #[test]
        fn prop_invariants_hold_for_small_alphabets(
            seed in prop::array::uniform3(0i64..4),
            inputs in prop::collection::vec(0i64..4, 0..100),
            tolerance in 0.0f64..2.0,
        ) {
            let mut filter = TemporalFilter::with_tolerance(seed, tolerance);
            check_invariants(&filter);
            for input in inputs {
                filter.apply(input);
                check_invariants(&filter);
            }
        }

        #[test]
        fn prop_invariants_hold_across_full_range(
            seed in prop::array::uniform4(any::<i64>()),
            inputs in prop::collection::vec(any::<i64>(), 0..100),
        ) {
            let mut filter = TemporalFilter::new(seed);
            for input in inputs {
                filter.apply(input);
                check_invariants(&filter);
            }
        }

        #[test]
        fn prop_rehabilitated_value_was_flagged(inputs in prop::collection::vec(spiky(), 0..200)) {
            let mut filter = TemporalFilter::new([1_000; 6]);
            let mut flagged: Option<i64> = None;
            for input in inputs {
                let outcome = filter.apply(input);
                if outcome.previous_not_outlier {
                    prop_assert_eq!(Some(outcome.previous_input), flagged);
                }
                flagged = filter.outlier();
            }
        }
    }
}
