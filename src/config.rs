//! Configuration for the cnvmerge pipeline.
//!
//! A single JSON file with three optional sections:
//! - `clustering`: strategy, thresholds and the density backend
//! - `input`: column layout of the processed-call table
//! - `output`: VCF header metadata
//!
//! Every field has a default, so `{}` is a valid configuration.

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;

use crate::cnv::cluster::ClusterKind;

// ============================================================================
// Clustering Configuration
// ============================================================================

/// Density backend used for islands of three or more calls
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process DBSCAN
    #[default]
    Native,
    /// External program reading a matrix file and writing a results file
    Command,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Command => "command",
        }
    }
}

/// What to do when one sample has several calls inside one merged locus
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Last call in island order wins (logged)
    #[default]
    KeepLast,
    /// First call in island order wins (logged)
    KeepFirst,
    /// Abort the pass
    Error,
}

/// External density command, run as `<program> <args..> <matrix> <results> <epsilon>`
#[derive(Deserialize, Debug, Clone)]
pub struct CommandConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,
    /// Parent directory for scratch files (system temp dir if unset)
    #[serde(default)]
    pub tmp_dir: Option<String>,
}

fn default_program() -> String { "Rscript".to_string() }
fn default_program_args() -> Vec<String> {
    vec!["--vanilla".to_string(), "scripts/merge_dbscan.R".to_string()]
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_program_args(),
            tmp_dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClusteringConfig {
    #[serde(default = "default_method")]
    pub method: ClusterKind,
    /// Mutual overlap required by the reciprocal strategy
    #[serde(default = "default_reciprocal_threshold")]
    pub reciprocal_threshold: f64,
    /// Neighbourhood radius on the `1 - overlap` distance
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Native DBSCAN core-point size, the point itself included
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub command: CommandConfig,
    /// 0 disables the timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub duplicate_sample: DuplicatePolicy,
}

fn default_method() -> ClusterKind { ClusterKind::Reciprocal }
fn default_reciprocal_threshold() -> f64 { 0.5 }
fn default_epsilon() -> f64 { 0.5 }
fn default_min_points() -> usize { 2 }
fn default_timeout_secs() -> u64 { 600 }

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            reciprocal_threshold: default_reciprocal_threshold(),
            epsilon: default_epsilon(),
            min_points: default_min_points(),
            backend: BackendKind::default(),
            command: CommandConfig::default(),
            timeout_secs: default_timeout_secs(),
            duplicate_sample: DuplicatePolicy::default(),
        }
    }
}

// ============================================================================
// Input Configuration
// ============================================================================

/// Zero-based column indices in the processed-call table
#[derive(Deserialize, Debug, Clone)]
pub struct ColumnConfig {
    #[serde(default)]
    pub chrom: usize,
    #[serde(default = "default_start_col")]
    pub start: usize,
    #[serde(default = "default_end_col")]
    pub end: usize,
    /// Column holding the per-sample file path; its file name is the sample id
    #[serde(default = "default_sample_col")]
    pub sample: usize,
    #[serde(default = "default_copy_number_col")]
    pub copy_number: usize,
    #[serde(default = "default_probe_count_col")]
    pub probe_count: usize,
    #[serde(default = "default_pass_col")]
    pub pass: usize,
    #[serde(default = "default_confidence_col")]
    pub confidence: usize,
}

fn default_start_col() -> usize { 1 }
fn default_end_col() -> usize { 2 }
fn default_sample_col() -> usize { 5 }
fn default_copy_number_col() -> usize { 8 }
fn default_probe_count_col() -> usize { 35 }
fn default_pass_col() -> usize { 45 }
fn default_confidence_col() -> usize { 60 }

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            chrom: 0,
            start: default_start_col(),
            end: default_end_col(),
            sample: default_sample_col(),
            copy_number: default_copy_number_col(),
            probe_count: default_probe_count_col(),
            pass: default_pass_col(),
            confidence: default_confidence_col(),
        }
    }
}

impl ColumnConfig {
    /// Number of columns a row must have to be parsed
    pub fn required_width(&self) -> usize {
        [
            self.chrom,
            self.start,
            self.end,
            self.sample,
            self.copy_number,
            self.probe_count,
            self.pass,
            self.confidence,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct InputConfig {
    #[serde(default)]
    pub columns: ColumnConfig,
    /// Keep only calls whose pass column is true
    #[serde(default = "default_filter")]
    pub filter: bool,
}

fn default_filter() -> bool { true }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::default(),
            filter: default_filter(),
        }
    }
}

// ============================================================================
// Output Configuration
// ============================================================================

#[derive(Deserialize, Debug, Clone)]
pub struct OutputConfig {
    /// `##source` value in the VCF header
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String { format!("cnvmerge-v{}", env!("CARGO_PKG_VERSION")) }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { source: default_source() }
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Main pipeline configuration
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl MergeConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: MergeConfig = serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: MergeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.clustering.method, ClusterKind::Reciprocal);
        assert_eq!(config.clustering.reciprocal_threshold, 0.5);
        assert_eq!(config.clustering.min_points, 2);
        assert_eq!(config.clustering.backend, BackendKind::Native);
        assert_eq!(config.clustering.duplicate_sample, DuplicatePolicy::KeepLast);
        assert_eq!(config.clustering.command.program, "Rscript");
        assert_eq!(config.input.columns.confidence, 60);
        assert_eq!(config.input.columns.required_width(), 61);
        assert!(config.input.filter);
        assert!(config.output.source.starts_with("cnvmerge-v"));
    }

    #[test]
    fn test_partial_sections() {
        let json = r#"{
            "clustering": {
                "method": "dbscan",
                "epsilon": 0.25,
                "backend": "command",
                "command": {"program": "python3", "args": ["dbscan.py"]},
                "duplicate_sample": "keep-first"
            },
            "input": {"columns": {"confidence": 9, "pass": 7}, "filter": false}
        }"#;
        let config: MergeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.clustering.method, ClusterKind::Dbscan);
        assert_eq!(config.clustering.epsilon, 0.25);
        assert_eq!(config.clustering.backend, BackendKind::Command);
        assert_eq!(config.clustering.command.args, vec!["dbscan.py"]);
        assert_eq!(config.clustering.timeout_secs, 600);
        assert_eq!(config.clustering.duplicate_sample, DuplicatePolicy::KeepFirst);
        assert_eq!(config.input.columns.start, 1);
        assert_eq!(config.input.columns.required_width(), 36);
        assert!(!config.input.filter);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"output": {{"source": "test-source"}}}}"#).unwrap();
        let config = MergeConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.output.source, "test-source");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        let err = MergeConfig::load(bad.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
