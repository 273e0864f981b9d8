use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// LCA assignment algorithm for the taxonomy classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LcaAlgorithm {
    Naive,
    Weighted,
    NaiveLongRead,
    CoverageLongRead,
}

impl LcaAlgorithm {
    pub fn is_long_read(self) -> bool {
        matches!(self, LcaAlgorithm::NaiveLongRead | LcaAlgorithm::CoverageLongRead)
    }
}

impl fmt::Display for LcaAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LcaAlgorithm::Naive => "naive",
            LcaAlgorithm::Weighted => "weighted",
            LcaAlgorithm::NaiveLongRead => "longReads",
            LcaAlgorithm::CoverageLongRead => "coverage",
        };
        f.write_str(s)
    }
}

/// Alignment program that produced the matches; descriptive only, carried
/// into the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BlastMode {
    BlastN,
    BlastX,
    BlastP,
    #[default]
    Unknown,
}

impl fmt::Display for BlastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlastMode::BlastN => "BlastN",
            BlastMode::BlastX => "BlastX",
            BlastMode::BlastP => "BlastP",
            BlastMode::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Immutable analysis parameters, decided at invocation.
///
/// Loadable from TOML (all fields optional, falling back to defaults) or
/// built programmatically. `validate()` must pass before the pipeline
/// accepts the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Minimum bit score for a match to be considered.
    pub min_score: f64,
    /// Keep matches scoring within this percent of the best match.
    pub top_percent: f64,
    /// Maximum expected value for a match to be considered.
    pub max_expected: f64,
    /// Minimum percent identity; 0 disables the check.
    pub min_percent_identity: f64,
    /// Reads below this complexity are set aside; 0 disables the check.
    pub min_complexity: f64,
    /// Minimum percent of a read that must be covered by matches.
    pub min_percent_read_to_cover: f64,
    pub lca_algorithm: LcaAlgorithm,
    /// Clamp 16S taxonomic assignments by percent identity.
    pub use_identity_filter: bool,
    /// Long-read mode: weights scale by read length, coverage uses the
    /// interval union.
    pub long_reads: bool,
    /// Combine mate pairs during taxonomic assignment (random-access
    /// archives only).
    pub paired_reads: bool,
    pub use_weighted_read_counts: bool,
    /// Absolute min-support threshold; 0 disables.
    pub min_support: u64,
    /// Percent form of min-support; overrides `min_support` when > 0.
    pub min_support_percent: f64,
    /// Weight fraction a node must accumulate under the weighted and
    /// coverage LCA algorithms.
    pub weighted_lca_percent: f64,
    pub blast_mode: BlastMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            min_score: 50.0,
            top_percent: 10.0,
            max_expected: 0.01,
            min_percent_identity: 0.0,
            min_complexity: 0.0,
            min_percent_read_to_cover: 0.0,
            lca_algorithm: LcaAlgorithm::Naive,
            use_identity_filter: false,
            long_reads: false,
            paired_reads: false,
            use_weighted_read_counts: false,
            min_support: 0,
            min_support_percent: 0.0,
            weighted_lca_percent: 80.0,
            blast_mode: BlastMode::Unknown,
        }
    }
}

impl AnalysisConfig {
    /// Check all parameters against their documented ranges.
    pub fn validate(&self) -> Result<()> {
        if self.min_score < 0.0 {
            return Err(anyhow!("min_score must be >= 0 (got {})", self.min_score));
        }
        if !(0.0..=100.0).contains(&self.top_percent) {
            return Err(anyhow!(
                "top_percent must be in [0,100] (got {})",
                self.top_percent
            ));
        }
        if self.max_expected < 0.0 {
            return Err(anyhow!(
                "max_expected must be >= 0 (got {})",
                self.max_expected
            ));
        }
        if !(0.0..=100.0).contains(&self.min_percent_identity) {
            return Err(anyhow!(
                "min_percent_identity must be in [0,100] (got {})",
                self.min_percent_identity
            ));
        }
        if !(0.0..=1.0).contains(&self.min_complexity) {
            return Err(anyhow!(
                "min_complexity must be in [0,1] (got {})",
                self.min_complexity
            ));
        }
        if !(0.0..=100.0).contains(&self.min_percent_read_to_cover) {
            return Err(anyhow!(
                "min_percent_read_to_cover must be in [0,100] (got {})",
                self.min_percent_read_to_cover
            ));
        }
        if !(0.0..100.0).contains(&self.min_support_percent) {
            return Err(anyhow!(
                "min_support_percent must be in [0,100) (got {})",
                self.min_support_percent
            ));
        }
        if !(self.weighted_lca_percent > 0.0 && self.weighted_lca_percent <= 100.0) {
            return Err(anyhow!(
                "weighted_lca_percent must be in (0,100] (got {})",
                self.weighted_lca_percent
            ));
        }
        Ok(())
    }

    /// One-line rendering of the active parameters, recorded in the
    /// summary alongside the committed data.
    pub fn parameter_string(&self) -> String {
        format!(
            "minScore={} maxExpected={} minPercentIdentity={} topPercent={} minSupportPercent={} minSupport={} lcaAlgorithm={} weightedLCAPercent={} minPercentReadToCover={} minComplexity={} longReads={} pairedReads={} identityFilter={} weightedReadCounts={}",
            self.min_score,
            self.max_expected,
            self.min_percent_identity,
            self.top_percent,
            self.min_support_percent,
            self.min_support,
            self.lca_algorithm,
            self.weighted_lca_percent,
            self.min_percent_read_to_cover,
            self.min_complexity,
            self.long_reads,
            self.paired_reads,
            self.use_identity_filter,
            self.use_weighted_read_counts,
        )
    }
}

/// Parse an analysis config from a TOML file and validate it.
pub fn parse_config(path: &Path) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)
        .context(format!("Failed to read config file: {}", path.display()))?;

    let config: AnalysisConfig =
        toml::from_str(&contents).context("Failed to parse TOML config")?;

    config.validate()?;
    Ok(config)
}
