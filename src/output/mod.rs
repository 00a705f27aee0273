//! Merge outputs and the run summary
//!
//! This module provides:
//! - `TrackWriter`: merged and raw BED tracks of one copy-type pass, plus the per-individual report
//! - `VariantEmitter`: the multi-sample VCF shared by both passes
//! - `MergeSummary` / `SummaryCollector`: the JSON run summary and its builder
//!
//! # Example
//!
//! ```ignore
//! use cnvmerge::output::SummaryCollector;
//!
//! let mut collector = SummaryCollector::new().with_clustering(clustering);
//! collector.add_pass(del_pass);
//! collector.write_to_prefix("cohort")?;
//! ```

pub mod collector;
pub mod schema;
pub mod tracks;
pub mod types;
pub mod vcf;

// Re-export main types for convenience
pub use collector::SummaryCollector;
pub use tracks::TrackWriter;
pub use types::{ChromosomeStats, ClusteringSummary, InputSummary, MergeSummary, PassSummary};
pub use vcf::{Annotators, Genotype, GenotypeMap, VariantEmitter, VcfHeader};
