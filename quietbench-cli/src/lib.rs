#![warn(missing_docs)]
//! QuietBench CLI Library
//!
//! Command-line front end for the statistics engine. Sample files hold one
//! integer nanosecond measurement per line; blank lines and `#` comments are
//! ignored. Samples are run through the temporal filter before any
//! statistics are computed.
//!
//! # Example
//!
//! ```text
//! quietbench analyze samples.txt
//! quietbench compare before.txt after.txt --format json --seed 7
//! quietbench init-config
//! ```

mod config;
mod report;

pub use config::*;
pub use report::{
    AnalysisReport, ComparisonReport, OutputFormat, format_analysis_human,
    format_comparison_human, format_duration, generate_json_report,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use quietbench_core::{DEFAULT_WINDOW, SampleRecorder};
use quietbench_stats::{
    ComparisonConfig, Distribution, compare_distributions, compute_percentiles, compute_summary,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io::Write;
use std::path::{Path, PathBuf};

/// QuietBench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "quietbench")]
#[command(author, version, about = "QuietBench - noise-filtered timing statistics")]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: human, json (defaults to quiet.toml, then human)
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Seed for reproducible resampling
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Temporal filter tolerance
    #[arg(long, global = true)]
    pub tolerance: Option<f64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter and summarize one sample file
    Analyze {
        /// Sample file (one nanosecond value per line)
        #[arg(name = "FILE")]
        file: PathBuf,
    },
    /// Compare a candidate sample file against a baseline
    Compare {
        /// Baseline sample file
        #[arg(name = "BASELINE")]
        baseline: PathBuf,
        /// Candidate sample file
        #[arg(name = "CANDIDATE")]
        candidate: PathBuf,
    },
    /// Write a default quiet.toml to the current directory
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Settings after merging quiet.toml with CLI flags (CLI flags win)
#[derive(Debug, Clone)]
pub struct Settings {
    /// Output format
    pub format: OutputFormat,
    /// Temporal filter tolerance
    pub tolerance: f64,
    /// Resampling seed
    pub seed: Option<u64>,
    /// Comparison parameters
    pub comparison: ComparisonConfig,
}

impl Settings {
    /// Merge CLI flags over a configuration file
    pub fn resolve(cli: &Cli, config: &QuietConfig) -> anyhow::Result<Self> {
        let format = cli
            .format
            .as_deref()
            .unwrap_or(&config.output.format)
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let tolerance = cli.tolerance.unwrap_or(config.filter.tolerance);
        if !tolerance.is_finite() || tolerance < 0.0 {
            anyhow::bail!("Filter tolerance must be finite and non-negative, got {tolerance}");
        }

        Ok(Self {
            format,
            tolerance,
            seed: cli.seed.or(config.sampling.seed),
            comparison: ComparisonConfig::from(&config.comparison),
        })
    }
}

/// Run the QuietBench CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the QuietBench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("quietbench=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("quietbench=info")
            .with_writer(std::io::stderr)
            .init();
    }

    // Discover quiet.toml configuration (CLI flags override)
    let config = QuietConfig::discover().unwrap_or_default();
    let settings = Settings::resolve(&cli, &config)?;

    let output = match &cli.command {
        Commands::Analyze { file } => {
            let (report, _) = analyze_file(file, settings.tolerance)?;
            match settings.format {
                OutputFormat::Json => generate_json_report(&report)?,
                OutputFormat::Human => format_analysis_human(&report),
            }
        }
        Commands::Compare {
            baseline,
            candidate,
        } => {
            let report = compare_files(baseline, candidate, &settings)?;
            match settings.format {
                OutputFormat::Json => generate_json_report(&report)?,
                OutputFormat::Human => format_comparison_human(&report),
            }
        }
        Commands::InitConfig { force } => {
            return init_config(Path::new(CONFIG_FILE_NAME), *force);
        }
    };

    // Write output
    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}

/// Parse a sample listing: one integer per line, `#` starts a comment
pub fn parse_samples(text: &str) -> anyhow::Result<Vec<i64>> {
    let mut samples = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let value: i64 = line
            .parse()
            .with_context(|| format!("line {}: invalid sample {:?}", idx + 1, line))?;
        samples.push(value);
    }
    Ok(samples)
}

/// Filter samples and summarize what was kept
pub fn analyze_samples(
    source: &str,
    samples: &[i64],
    tolerance: f64,
) -> anyhow::Result<(AnalysisReport, Distribution)> {
    let mut recorder = SampleRecorder::<DEFAULT_WINDOW>::with_tolerance(tolerance);
    recorder.extend(samples.iter().copied());
    let run = recorder
        .finish()
        .with_context(|| format!("Cannot analyze {source}"))?;

    tracing::info!(
        source,
        kept = run.stats.kept(),
        dropped = run.stats.dropped(),
        "Filtered samples"
    );

    let report = AnalysisReport {
        source: source.to_string(),
        filter: run.stats,
        summary: compute_summary(&run.distribution),
        percentiles: compute_percentiles(&run.distribution),
    };
    Ok((report, run.distribution))
}

fn analyze_file(path: &Path, tolerance: f64) -> anyhow::Result<(AnalysisReport, Distribution)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let samples =
        parse_samples(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    analyze_samples(&path.display().to_string(), &samples, tolerance)
}

/// Random source for resampling: seeded when reproducibility is requested
pub fn make_rng(seed: Option<u64>) -> Box<dyn RngCore> {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::thread_rng()),
    }
}

fn compare_files(
    baseline: &Path,
    candidate: &Path,
    settings: &Settings,
) -> anyhow::Result<ComparisonReport> {
    let (baseline_report, baseline_dist) = analyze_file(baseline, settings.tolerance)?;
    let (candidate_report, candidate_dist) = analyze_file(candidate, settings.tolerance)?;

    let mut rng = make_rng(settings.seed);
    let comparison = compare_distributions(
        &baseline_dist,
        &candidate_dist,
        &settings.comparison,
        &mut *rng,
    )?;

    Ok(ComparisonReport {
        baseline: baseline_report,
        candidate: candidate_report,
        comparison,
    })
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    std::fs::write(path, QuietConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration written to: {}", path.display());
    Ok(())
}
