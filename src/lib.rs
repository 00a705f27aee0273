//! Merge per-sample CNV calls into cohort-level loci.
//!
//! Calls are grouped into islands of overlapping intervals, each island is clustered
//! (reciprocal overlap or density based), and every cluster becomes one merged locus
//! written to BED tracks, a per-individual report and a multi-sample VCF.

pub mod cnv;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod utils;
