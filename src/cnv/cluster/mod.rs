//! Clustering strategies deciding which calls of an island are one event.
//!
//! Two strategies are available, picked from configuration:
//! - `ReciprocalClustering`: connected components of the mutual-overlap graph
//! - `DensityClustering`: closed form for one or two calls, a pluggable density-based
//!   backend (external command or in-process DBSCAN) for larger islands

pub mod backend;
pub mod density;
pub mod reciprocal;

use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::call::CnvCall;
use super::interval::GenomicInterval;
use crate::config::{BackendKind, ClusteringConfig};
use crate::error::MergeResult;

pub use backend::{CommandBackend, DensityBackend, NativeDbscan};
pub use density::DensityClustering;
pub use reciprocal::ReciprocalClustering;

/// A set of island calls judged to be one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Union of every member's interval
    pub interval: GenomicInterval,
    /// Positions of the members within the island slice handed to `cluster`, ascending
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn singleton(pos: usize, call: &CnvCall) -> Self {
        Self { interval: call.interval.clone(), members: vec![pos] }
    }

    pub fn absorb(&mut self, pos: usize, call: &CnvCall) {
        self.interval = self.interval.union(&call.interval);
        self.members.push(pos);
        self.members.sort_unstable();
    }
}

/// Clusters keyed by dense ids `1..=k`.
pub type ClusterMap = BTreeMap<usize, Cluster>;

/// Which strategy produced a set of outputs; also part of every output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClusterKind {
    Reciprocal,
    Dbscan,
}

impl ClusterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterKind::Reciprocal => "RECIPROCAL",
            ClusterKind::Dbscan => "DBSCAN",
        }
    }
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clustering contract shared by all strategies.
pub trait Clusterer {
    /// Partition one island's calls. Every call lands in exactly one cluster.
    fn cluster(&self, island: &[&CnvCall]) -> MergeResult<ClusterMap>;

    fn kind(&self) -> ClusterKind;

    /// Numeric parameter shown in track names (epsilon or overlap threshold).
    fn parameter(&self) -> f64;
}

/// Smallest interval covering every call; the island envelope when given a whole island.
pub fn envelope(calls: &[&CnvCall]) -> Option<GenomicInterval> {
    let mut iter = calls.iter();
    let first = iter.next()?.interval.clone();
    Some(iter.fold(first, |acc, c| acc.union(&c.interval)))
}

/// Renumber clusters to `1..=k`, keeping their relative order.
pub(crate) fn compact(clusters: BTreeMap<usize, Cluster>) -> ClusterMap {
    clusters.into_values().enumerate().map(|(i, c)| (i + 1, c)).collect()
}

/// Build the strategy selected in the configuration.
pub fn build_clusterer(config: &ClusteringConfig) -> Box<dyn Clusterer> {
    match config.method {
        ClusterKind::Reciprocal => Box::new(ReciprocalClustering::new(config.reciprocal_threshold)),
        ClusterKind::Dbscan => {
            let backend: Box<dyn DensityBackend> = match config.backend {
                BackendKind::Native => Box::new(NativeDbscan::new(config.min_points)),
                BackendKind::Command => Box::new(CommandBackend::from_config(&config.command, config.timeout_secs)),
            };
            Box::new(DensityClustering::new(config.epsilon, backend))
        }
    }
}
