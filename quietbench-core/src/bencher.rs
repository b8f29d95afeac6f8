//! Bencher - The Benchmark Iteration API
//!
//! Provides the user-facing API for defining what to measure. Every timed
//! call is one sample; samples go through a [`SampleRecorder`] so that
//! interruptions (preemption, page faults, interrupts) are rejected before
//! they reach the distribution.

use crate::measure::Timer;
use crate::recorder::{Recorded, RecorderError, RecorderStats, SampleRecorder};
use quietbench_stats::{Distribution, SummaryStatistics, compute_summary};

/// Default temporal filter window
pub const DEFAULT_WINDOW: usize = 8;

/// Result of a single benchmark run
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Distribution of kept per-iteration durations (nanoseconds)
    pub distribution: Distribution,
    /// Summary of `distribution`
    pub stats: SummaryStatistics,
    /// Filter accounting
    pub recorder: RecorderStats,
    /// Total iterations performed, warmup included
    pub iterations: u64,
}

/// The Bencher provides iteration control for benchmarks.
///
/// `N` is the temporal filter window; at least `N` measured iterations are
/// needed before [`Bencher::finish`] succeeds.
pub struct Bencher<const N: usize = DEFAULT_WINDOW> {
    recorder: SampleRecorder<N>,
    total_iterations: u64,
    warmup_iterations: u64,
}

impl<const N: usize> Default for Bencher<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Bencher<N> {
    /// Create a new Bencher
    pub fn new() -> Self {
        Self::from_recorder(SampleRecorder::new())
    }

    /// Create a Bencher with a custom filter tolerance
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self::from_recorder(SampleRecorder::with_tolerance(tolerance))
    }

    fn from_recorder(recorder: SampleRecorder<N>) -> Self {
        Self {
            recorder,
            total_iterations: 0,
            warmup_iterations: 0,
        }
    }

    /// Run the closure without recording, to warm caches and branch predictors
    pub fn warmup<T, F>(&mut self, iterations: u64, mut f: F)
    where
        F: FnMut() -> T,
    {
        for _ in 0..iterations {
            let _ = std::hint::black_box(f());
        }
        self.total_iterations += iterations;
        self.warmup_iterations += iterations;
    }

    /// Run the benchmark closure for one timed iteration.
    #[inline]
    pub fn iter<T, F>(&mut self, mut f: F) -> Recorded
    where
        F: FnMut() -> T,
    {
        let timer = Timer::start();
        let _ = std::hint::black_box(f());
        let nanos = timer.stop();

        self.total_iterations += 1;
        self.recorder.record(nanos)
    }

    /// Run the benchmark with separate setup phase
    #[inline]
    pub fn iter_with_setup<T, S, F, R>(&mut self, mut setup: S, mut routine: F) -> Recorded
    where
        S: FnMut() -> T,
        F: FnMut(T) -> R,
    {
        // Run setup (not timed)
        let input = setup();

        let timer = Timer::start();
        let _ = std::hint::black_box(routine(input));
        let nanos = timer.stop();

        self.total_iterations += 1;
        self.recorder.record(nanos)
    }

    /// Run `iterations` timed iterations
    pub fn run<T, F>(&mut self, iterations: u64, mut f: F)
    where
        F: FnMut() -> T,
    {
        for _ in 0..iterations {
            self.iter(&mut f);
        }
    }

    /// Get total iteration count
    pub fn iteration_count(&self) -> u64 {
        self.total_iterations
    }

    /// Get measured (non-warmup) iteration count
    pub fn measured_count(&self) -> u64 {
        self.total_iterations - self.warmup_iterations
    }

    /// Filter accounting so far
    pub fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    /// Finalize and return results
    pub fn finish(self) -> Result<BenchmarkResult, RecorderError> {
        let run = self.recorder.finish()?;
        let stats = compute_summary(&run.distribution);

        Ok(BenchmarkResult {
            distribution: run.distribution,
            stats,
            recorder: run.stats,
            iterations: self.total_iterations,
        })
    }
}
