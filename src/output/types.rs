//! Run summary written next to the merged tracks and the VCF.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cnv::cluster::ClusterKind;

/// Top-level summary of one merge run
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MergeSummary {
    /// cnvmerge version
    pub version: String,

    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,

    /// Clustering strategy and its parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering: Option<ClusteringSummary>,

    /// What was read from the call table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputSummary>,

    /// One entry per copy-type pass, in run order
    #[serde(default)]
    pub passes: Vec<PassSummary>,

    /// Files written by the run
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClusteringSummary {
    pub method: ClusterKind,

    /// Overlap threshold (reciprocal) or epsilon (density)
    pub parameter: f64,

    /// Density backend name, absent for reciprocal clustering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InputSummary {
    /// Calls kept after filtering
    pub calls: usize,

    /// Calls dropped by the pass filter
    pub filtered: usize,

    /// Samples in the VCF, in column order
    pub samples: usize,

    /// Chromosomes in the call table
    pub chromosomes: Vec<String>,
}

/// Statistics of one copy-type merge pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PassSummary {
    /// `DEL` or `DUP`
    pub copy_type: String,

    /// Merge groups allocated; also the last merge-group id
    pub merged_loci: u32,

    /// Calls attached to a merge group
    pub calls: usize,

    /// Samples that contributed more than one call to a locus
    #[serde(default)]
    pub duplicate_samples: usize,

    pub chromosomes: Vec<ChromosomeStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChromosomeStats {
    pub chrom: String,
    pub islands: usize,
    pub clusters: usize,
    pub calls: usize,
}
