#![warn(missing_docs)]
//! QuietBench Core - Measurement
//!
//! This crate turns timed closures into filtered distributions:
//! - `Timer` for wall-clock nanosecond samples
//! - `SampleRecorder` feeding samples through the temporal filter into a
//!   distribution builder
//! - `Bencher` struct for iteration-based benchmarking

mod bencher;
mod measure;
mod recorder;

pub use bencher::{Bencher, BenchmarkResult, DEFAULT_WINDOW};
pub use measure::Timer;
pub use recorder::{Recorded, RecordedRun, RecorderError, RecorderStats, SampleRecorder};
