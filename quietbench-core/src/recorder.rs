//! Sample Recorder
//!
//! Glues the temporal filter to a distribution builder. The first `N` samples
//! seed the filter window; from then on every sample is classified on arrival.
//! Samples judged normal go into the distribution immediately. A flagged
//! sample is held back, and only inserted if a later sample shows it was
//! normal after all. A flagged sample that leaves the window still flagged is
//! dropped for good.

use quietbench_stats::{
    DEFAULT_TOLERANCE, Distribution, DistributionBuilder, DistributionError, TemporalFilter,
};
use serde::{Deserialize, Serialize};

/// What happened to a recorded sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Stored in the seed window; classified once the window is full
    Seeding,
    /// Inserted into the distribution
    Accepted {
        /// Previously flagged sample that was inserted along with this one
        rehabilitated: Option<i64>,
    },
    /// Flagged as an interruption outlier and held back
    Rejected {
        /// Previously flagged sample that this one displaced and cleared
        rehabilitated: Option<i64>,
    },
}

impl Recorded {
    /// Previously flagged sample cleared by this one, if any
    pub fn rehabilitated(&self) -> Option<i64> {
        match *self {
            Recorded::Seeding => None,
            Recorded::Accepted { rehabilitated } | Recorded::Rejected { rehabilitated } => {
                rehabilitated
            }
        }
    }
}

/// Running counts kept by a [`SampleRecorder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    /// Samples passed to `record`
    pub recorded: u64,
    /// Samples inserted as soon as they were classified
    pub accepted: u64,
    /// Samples flagged on classification
    pub rejected: u64,
    /// Flagged samples inserted later
    pub rehabilitated: u64,
}

impl RecorderStats {
    /// Samples that ended up in the distribution
    pub fn kept(&self) -> u64 {
        self.accepted + self.rehabilitated
    }

    /// Samples that were flagged and never cleared
    pub fn dropped(&self) -> u64 {
        self.rejected - self.rehabilitated
    }
}

/// Output of a finished [`SampleRecorder`]
#[derive(Debug, Clone)]
pub struct RecordedRun {
    /// Distribution of every kept sample
    pub distribution: Distribution,
    /// Final counts
    pub stats: RecorderStats,
}

/// Errors from finishing a recording
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecorderError {
    #[error("Not enough samples: got {got}, the filter window needs {need}")]
    NotEnoughSamples { got: usize, need: usize },
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Filters a stream of samples into a distribution.
///
/// `N` is the temporal filter window size.
pub struct SampleRecorder<const N: usize> {
    seed: [i64; N],
    seeded: usize,
    tolerance: f64,
    filter: Option<TemporalFilter<N>>,
    builder: DistributionBuilder,
    stats: RecorderStats,
}

impl<const N: usize> Default for SampleRecorder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleRecorder<N> {
    /// Create a recorder using the default filter tolerance
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_TOLERANCE)
    }

    /// Create a recorder with a custom filter tolerance
    ///
    /// The tolerance is validated when the seed window fills.
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            seed: [0; N],
            seeded: 0,
            tolerance,
            filter: None,
            builder: DistributionBuilder::new(),
            stats: RecorderStats::default(),
        }
    }

    /// Counts so far
    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    /// The filter, once the seed window is full
    pub fn filter(&self) -> Option<&TemporalFilter<N>> {
        self.filter.as_ref()
    }

    /// Classify one sample and insert whatever it lets through
    pub fn record(&mut self, sample: i64) -> Recorded {
        self.stats.recorded += 1;

        let Some(filter) = self.filter.as_mut() else {
            self.seed[self.seeded] = sample;
            self.seeded += 1;
            if self.seeded == N {
                self.start_filter();
            }
            return Recorded::Seeding;
        };

        let outcome = filter.apply(sample);

        let rehabilitated = outcome.previous_not_outlier.then_some(outcome.previous_input);
        if let Some(previous) = rehabilitated {
            tracing::trace!(sample = previous, "Rehabilitated flagged sample");
            self.builder.insert(previous);
            self.stats.rehabilitated += 1;
        }

        if outcome.current_is_outlier {
            tracing::trace!(
                sample,
                upper_tolerance = filter.upper_tolerance(),
                "Rejected outlier"
            );
            self.stats.rejected += 1;
            Recorded::Rejected { rehabilitated }
        } else {
            self.builder.insert(sample);
            self.stats.accepted += 1;
            Recorded::Accepted { rehabilitated }
        }
    }

    fn start_filter(&mut self) {
        let filter = TemporalFilter::with_tolerance(self.seed, self.tolerance);
        let mut skipped = filter.outlier();
        for &value in filter.window() {
            if skipped == Some(value) {
                skipped = None;
                self.stats.rejected += 1;
                continue;
            }
            self.builder.insert(value);
            self.stats.accepted += 1;
        }
        tracing::trace!(
            min = filter.min(),
            max_normal = filter.max_normal(),
            outlier = ?filter.outlier(),
            "Seeded temporal filter"
        );
        self.filter = Some(filter);
    }

    /// Finish recording and build the distribution
    pub fn finish(self) -> Result<RecordedRun, RecorderError> {
        if self.filter.is_none() {
            return Err(RecorderError::NotEnoughSamples {
                got: self.seeded,
                need: N,
            });
        }

        let stats = self.stats;
        let distribution = self.builder.build()?;
        tracing::debug!(
            recorded = stats.recorded,
            kept = stats.kept(),
            dropped = stats.dropped(),
            rehabilitated = stats.rehabilitated,
            distinct_values = distribution.num_bins(),
            "Finished recording"
        );

        Ok(RecordedRun {
            distribution,
            stats,
        })
    }
}

impl<const N: usize> Extend<i64> for SampleRecorder<N> {
    fn extend<I: IntoIterator<Item = i64>>(&mut self, iter: I) {
        for sample in iter {
            self.record(sample);
        }
    }
}
