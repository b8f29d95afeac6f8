//! Report Rendering
//!
//! Reports are plain serde structures; rendering is either pretty JSON or
//! terminal-friendly text.

use quietbench_core::RecorderStats;
use quietbench_stats::{ComparisonResult, Percentiles, SummaryStatistics};
use serde::Serialize;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Analysis of one sample file
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Where the samples came from
    pub source: String,
    /// Temporal filter accounting
    pub filter: RecorderStats,
    /// Statistics of the kept samples
    pub summary: SummaryStatistics,
    /// Standard percentiles of the kept samples
    pub percentiles: Percentiles,
}

/// Comparison of two sample files
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    /// Baseline analysis
    pub baseline: AnalysisReport,
    /// Candidate analysis
    pub candidate: AnalysisReport,
    /// Statistical comparison of the two
    pub comparison: ComparisonResult,
}

/// Render any report as pretty-printed JSON
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Format a nanosecond quantity with a readable unit
pub fn format_duration(nanos: f64) -> String {
    let abs = nanos.abs();
    if abs < 1_000.0 {
        format!("{:.2} ns", nanos)
    } else if abs < 1_000_000.0 {
        format!("{:.2} µs", nanos / 1_000.0)
    } else if abs < 1_000_000_000.0 {
        format!("{:.2} ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2} s", nanos / 1_000_000_000.0)
    }
}

fn push_analysis(output: &mut String, report: &AnalysisReport) {
    let summary = &report.summary;
    let filter = &report.filter;

    output.push_str(&format!("  {}\n", report.source));
    output.push_str(&format!(
        "      mean: {}  median: {}  stddev: {}\n",
        format_duration(summary.mean),
        format_duration(summary.median),
        format_duration(summary.std_dev)
    ));
    output.push_str(&format!(
        "      min: {}  max: {}  samples: {} ({} distinct)\n",
        format_duration(summary.min as f64),
        format_duration(summary.max as f64),
        summary.sample_count,
        summary.distinct_values
    ));
    output.push_str(&format!(
        "      p50: {}  p95: {}  p99: {}  p99.9: {}\n",
        format_duration(report.percentiles.p50 as f64),
        format_duration(report.percentiles.p95 as f64),
        format_duration(report.percentiles.p99 as f64),
        format_duration(report.percentiles.p999 as f64)
    ));
    output.push_str(&format!(
        "      filter: {} recorded, {} kept, {} dropped ({} rehabilitated)\n",
        filter.recorded,
        filter.kept(),
        filter.dropped(),
        filter.rehabilitated
    ));
    output.push_str(&format!(
        "      cv: {:.2}%\n",
        summary.coefficient_of_variation()
    ));
}

/// Format an analysis for human-readable terminal display
pub fn format_analysis_human(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("QuietBench Analysis\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");
    push_analysis(&mut output, report);

    output
}

/// Format a comparison for human-readable terminal display
pub fn format_comparison_human(report: &ComparisonReport) -> String {
    let mut output = String::new();
    let cmp = &report.comparison;

    output.push('\n');
    output.push_str("QuietBench Comparison Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    output.push_str("Baseline\n");
    push_analysis(&mut output, &report.baseline);
    output.push('\n');
    output.push_str("Candidate\n");
    push_analysis(&mut output, &report.candidate);
    output.push('\n');

    let change_icon = if !cmp.is_significant {
        "≈ no significant change"
    } else if cmp.relative_change > 0.0 {
        "📈 REGRESSION"
    } else {
        "📉 improvement"
    };

    output.push_str("Comparison\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  change: {:+.2}% (mean {:+.2} ns) {}\n",
        cmp.relative_change, cmp.absolute_change, change_icon,
    ));
    output.push_str(&format!(
        "  P(regression): {:.1}%\n",
        cmp.probability_regression * 100.0
    ));
    output.push_str(&format!(
        "  slower sample pairs: {:.1}%\n",
        cmp.probability_slower_sample * 100.0
    ));
    output.push_str(&format!(
        "  mean difference CI: [{}, {}]\n",
        format_duration(cmp.difference_ci_lower),
        format_duration(cmp.difference_ci_upper)
    ));
    output.push_str(&format!(
        "  effect size: {:.2} ({})\n",
        cmp.effect_size, cmp.effect_interpretation
    ));

    output
}
