//! QuietBench Example
//!
//! Times two ways of summing a vector and compares them.
//!
//! Run with:
//!   cargo run --example benchmarks
//!   RUST_LOG=quietbench=trace cargo run --example benchmarks   # show filter decisions

use quietbench::prelude::*;
use quietbench::{ComparisonConfig, compute_percentiles};
use std::hint::black_box;

fn measure<F: FnMut() -> u64>(name: &str, mut f: F) -> anyhow::Result<Distribution> {
    let mut bencher: Bencher = Bencher::new();
    bencher.warmup(1_000, &mut f);
    bencher.run(20_000, &mut f);

    let result = bencher.finish()?;
    let p = compute_percentiles(&result.distribution);
    println!(
        "{name}: median {:.0} ns  p99 {} ns  kept {} / {} (rehabilitated {})",
        result.stats.median,
        p.p99,
        result.recorder.kept(),
        result.recorder.recorded,
        result.recorder.rehabilitated,
    );
    Ok(result.distribution)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quietbench=info")),
        )
        .init();

    let data: Vec<u64> = (0..4096).collect();

    let iterator = measure("iterator", || black_box(&data).iter().sum())?;
    let indexed = measure("indexed", || {
        let data = black_box(&data);
        let mut sum = 0u64;
        for i in 0..data.len() {
            sum += data[i];
        }
        sum
    })?;

    let comparison = compare_distributions(
        &iterator,
        &indexed,
        &ComparisonConfig::default(),
        &mut rand::thread_rng(),
    )?;
    println!(
        "indexed vs iterator: {:+.2}% (P(slower) = {:.2}, effect {})",
        comparison.relative_change,
        comparison.probability_regression,
        comparison.effect_interpretation
    );

    Ok(())
}
