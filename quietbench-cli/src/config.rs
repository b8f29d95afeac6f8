//! Configuration loading from quiet.toml
//!
//! QuietBench configuration can be specified in a `quiet.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.

use quietbench_stats::{
    ComparisonConfig, DEFAULT_BOOTSTRAP_ITERATIONS, DEFAULT_CONFIDENCE_LEVEL,
    DEFAULT_SIGNIFICANCE_THRESHOLD, DEFAULT_TOLERANCE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the file `discover` looks for
pub const CONFIG_FILE_NAME: &str = "quiet.toml";

/// QuietBench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuietConfig {
    /// Temporal filter configuration
    #[serde(default)]
    pub filter: FilterConfig,
    /// Random sampling configuration
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// A/B comparison configuration
    #[serde(default)]
    pub comparison: ComparisonSection,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Temporal filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Allowed overshoot above the largest normal sample, as a multiple of
    /// the window's normal spread
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// Random sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SamplingConfig {
    /// Seed for reproducible resampling (random when unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A/B comparison configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSection {
    /// Confidence level (e.g., 0.95 for 95%)
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Relative change (percent) a difference must reach to count as significant
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,
    /// Bootstrap resamples of the difference of means
    #[serde(default = "default_bootstrap_iterations")]
    pub bootstrap_iterations: usize,
}

impl Default for ComparisonSection {
    fn default() -> Self {
        Self {
            confidence_level: default_confidence_level(),
            significance_threshold: default_significance_threshold(),
            bootstrap_iterations: default_bootstrap_iterations(),
        }
    }
}

impl From<&ComparisonSection> for ComparisonConfig {
    fn from(section: &ComparisonSection) -> Self {
        ComparisonConfig {
            confidence_level: section.confidence_level,
            significance_threshold: section.significance_threshold,
            bootstrap_iterations: section.bootstrap_iterations,
        }
    }
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}
fn default_significance_threshold() -> f64 {
    DEFAULT_SIGNIFICANCE_THRESHOLD
}
fn default_bootstrap_iterations() -> usize {
    DEFAULT_BOOTSTRAP_ITERATIONS
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl QuietConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let dir = std::env::current_dir().ok()?;
        Self::discover_from(&dir)
    }

    /// Walk up from `start` to the first directory holding a `quiet.toml`
    pub fn discover_from(start: &Path) -> Option<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => {
                        tracing::debug!(path = %config_path.display(), "Loaded configuration");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %config_path.display(),
                            "Ignoring invalid configuration: {e}"
                        );
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# QuietBench Configuration

[filter]
# How far above the largest normal sample a new maximum may land before it is
# treated as an interruption, as a multiple of the window's normal spread
tolerance = 1.0

[sampling]
# Seed for reproducible comparisons (uncomment to enable)
# seed = 42

[comparison]
# Confidence level (0.0 to 1.0, exclusive)
confidence_level = 0.95
# Relative change (percent) required for a significant result
significance_threshold = 5.0
# Bootstrap resamples of the difference of means
bootstrap_iterations = 1000

[output]
# Default output format: human, json
format = "human"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QuietConfig::default();
        assert_eq!(config.filter.tolerance, 1.0);
        assert_eq!(config.sampling.seed, None);
        assert_eq!(config.comparison.confidence_level, 0.95);
        assert_eq!(config.comparison.significance_threshold, 5.0);
        assert_eq!(config.comparison.bootstrap_iterations, 1_000);
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [filter]
            tolerance = 0.5

            [sampling]
            seed = 7
        "#;

        let config: QuietConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.filter.tolerance, 0.5);
        assert_eq!(config.sampling.seed, Some(7));
        // Defaults should still apply
        assert_eq!(config.output.format, "human");
        assert_eq!(config.comparison.confidence_level, 0.95);
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = QuietConfig::default_toml();
        let config: QuietConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.filter.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.sampling.seed, None);
        assert_eq!(config.comparison.significance_threshold, 5.0);
        assert_eq!(
            config.comparison.bootstrap_iterations,
            DEFAULT_BOOTSTRAP_ITERATIONS
        );
    }

    #[test]
    fn test_comparison_config_conversion() {
        let section = ComparisonSection {
            confidence_level: 0.99,
            significance_threshold: 2.0,
            bootstrap_iterations: 250,
        };
        let config = ComparisonConfig::from(&section);
        assert_eq!(config.confidence_level, 0.99);
        assert_eq!(config.significance_threshold, 2.0);
        assert_eq!(config.bootstrap_iterations, 250);
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "[filter]\ntolerance = 3.0\n",
        )
        .unwrap();

        let config = QuietConfig::discover_from(&nested).unwrap();
        assert_eq!(config.filter.tolerance, 3.0);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let root = tempfile::tempdir().unwrap();
        assert!(QuietConfig::load(&root.path().join(CONFIG_FILE_NAME)).is_err());
    }
}
