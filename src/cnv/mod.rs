//! Copy-number calls and the grouping/clustering machinery that merges them.

pub mod call;
pub mod cluster;
pub mod interval;
pub mod island;
pub mod similarity;

pub use call::{CnvCall, CopyType};
pub use interval::GenomicInterval;
