use std::collections::{BTreeMap, HashMap};

use log::debug;

use super::backend::{Assignment, DensityBackend, NOISE};
use super::{Cluster, ClusterKind, ClusterMap, Clusterer, envelope};
use crate::cnv::call::CnvCall;
use crate::cnv::similarity::{SimilarityMatrix, doubleton_merges};
use crate::error::{MergeError, MergeResult};

/// Density-based clustering: closed form for one or two calls, the backend for the rest.
pub struct DensityClustering {
    epsilon: f64,
    backend: Box<dyn DensityBackend>,
}

impl DensityClustering {
    pub fn new(epsilon: f64, backend: Box<dyn DensityBackend>) -> Self {
        Self { epsilon, backend }
    }

    /// Row/column keys for the matrix, unique within the island.
    fn island_ids(island: &[&CnvCall]) -> Vec<String> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        island
            .iter()
            .map(|call| {
                let base = call.identifier();
                let count = seen.entry(base.clone()).or_insert(0);
                *count += 1;
                if *count == 1 { base } else { format!("{}_{}", base, count) }
            })
            .collect()
    }

    fn cluster_many(&self, island: &[&CnvCall]) -> MergeResult<ClusterMap> {
        let failure = |reason: String| MergeError::ExternalClusteringFailure {
            island: envelope(island).map(|e| e.to_string()).unwrap_or_default(),
            reason,
        };

        let ids = Self::island_ids(island);
        let matrix = SimilarityMatrix::distance(island);
        debug!(
            "{} backend: {} calls, eps={}",
            self.backend.name(),
            island.len(),
            self.epsilon
        );
        let assignments = self
            .backend
            .assign(&matrix, &ids, self.epsilon)
            .map_err(|e| failure(format!("{:#}", e)))?;

        let labels = resolve_labels(&ids, &assignments).map_err(failure)?;

        let mut clusters: BTreeMap<usize, Cluster> = BTreeMap::new();
        for (pos, &label) in labels.iter().enumerate() {
            if label == NOISE {
                continue;
            }
            match clusters.get_mut(&label) {
                Some(cluster) => cluster.absorb(pos, island[pos]),
                None => {
                    clusters.insert(label, Cluster::singleton(pos, island[pos]));
                }
            }
        }

        // Noise calls become their own clusters after the real ones
        let mut next = clusters.keys().next_back().copied().unwrap_or(0) + 1;
        for (pos, &label) in labels.iter().enumerate() {
            if label == NOISE {
                clusters.insert(next, Cluster::singleton(pos, island[pos]));
                next += 1;
            }
        }
        Ok(super::compact(clusters))
    }
}

/// Map backend output back onto island positions. Every id must be labelled exactly once.
fn resolve_labels(ids: &[String], assignments: &[Assignment]) -> Result<Vec<usize>, String> {
    let positions: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    let mut labels: Vec<Option<usize>> = vec![None; ids.len()];
    for a in assignments {
        let pos = *positions
            .get(a.id.as_str())
            .ok_or_else(|| format!("unknown call id in results: {}", a.id))?;
        if labels[pos].replace(a.cluster).is_some() {
            return Err(format!("call id {} assigned more than once", a.id));
        }
    }
    labels
        .into_iter()
        .enumerate()
        .map(|(i, l)| l.ok_or_else(|| format!("no cluster assigned to {}", ids[i])))
        .collect()
}

impl Clusterer for DensityClustering {
    fn cluster(&self, island: &[&CnvCall]) -> MergeResult<ClusterMap> {
        let mut clusters = ClusterMap::new();
        match island {
            [] => {}
            [only] => {
                clusters.insert(1, Cluster::singleton(0, only));
            }
            [a, b] => {
                let mut first = Cluster::singleton(0, a);
                if doubleton_merges(a, b) {
                    first.absorb(1, b);
                    clusters.insert(1, first);
                } else {
                    clusters.insert(1, first);
                    clusters.insert(2, Cluster::singleton(1, b));
                }
            }
            _ => return self.cluster_many(island),
        }
        Ok(clusters)
    }

    fn kind(&self) -> ClusterKind {
        ClusterKind::Dbscan
    }

    fn parameter(&self) -> f64 {
        self.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnv::cluster::NativeDbscan;
    use crate::cnv::interval::GenomicInterval;
    use anyhow::anyhow;
    use std::cell::Cell;

    fn call(start: u32, end: u32, sample: &str) -> CnvCall {
        CnvCall::new("chr1", start, end, 1, 10, 10.0, sample)
    }

    /// Backend that replays fixed labels (in row order) and counts invocations.
    struct Scripted {
        labels: Vec<usize>,
        calls: Cell<usize>,
    }

    impl DensityBackend for Scripted {
        fn assign(&self, _m: &SimilarityMatrix, ids: &[String], _eps: f64) -> anyhow::Result<Vec<Assignment>> {
            self.calls.set(self.calls.get() + 1);
            Ok(ids
                .iter()
                .zip(&self.labels)
                .map(|(id, &cluster)| Assignment { id: id.clone(), cluster })
                .collect())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Failing;

    impl DensityBackend for Failing {
        fn assign(&self, _m: &SimilarityMatrix, _ids: &[String], _eps: f64) -> anyhow::Result<Vec<Assignment>> {
            Err(anyhow!("script crashed"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn scripted(labels: Vec<usize>) -> DensityClustering {
        DensityClustering::new(0.5, Box::new(Scripted { labels, calls: Cell::new(0) }))
    }

    #[test]
    fn test_small_islands_skip_backend() {
        let d = DensityClustering::new(0.5, Box::new(Failing));
        assert!(d.cluster(&[]).unwrap().is_empty());

        let a = call(100, 200, "A");
        let one = d.cluster(&[&a]).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[&1].interval, a.interval);

        let b = call(110, 210, "B");
        let merged = d.cluster(&[&a, &b]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[&1].interval, GenomicInterval::new("chr1", 100, 210));

        let c = call(160, 260, "C");
        let split = d.cluster(&[&a, &c]).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split[&1].members, vec![0]);
        assert_eq!(split[&2].members, vec![1]);
    }

    #[test]
    fn test_half_overlap_pair_is_split() {
        let d = DensityClustering::new(0.5, Box::new(Failing));
        let a = call(100, 200, "A");
        let b = call(150, 250, "B");
        let clusters = d.cluster(&[&a, &b]).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[&1].interval, a.interval);
        assert_eq!(clusters[&2].interval, b.interval);
    }

    #[test]
    fn test_noise_becomes_singletons() {
        let calls = [call(100, 200, "A"), call(105, 205, "B"), call(150, 900, "C"), call(110, 210, "D")];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let clusters = scripted(vec![2, 2, NOISE, 2]).cluster(&refs).unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[&1].members, vec![0, 1, 3]);
        assert_eq!(clusters[&1].interval, GenomicInterval::new("chr1", 100, 210));
        assert_eq!(clusters[&2].members, vec![2]);
    }

    #[test]
    fn test_all_noise() {
        let calls = [call(100, 200, "A"), call(150, 300, "B"), call(250, 400, "C")];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let clusters = scripted(vec![NOISE, NOISE, NOISE]).cluster(&refs).unwrap();
        assert_eq!(clusters.len(), 3);
        for (i, (&id, c)) in clusters.iter().enumerate() {
            assert_eq!(id, i + 1);
            assert_eq!(c.members, vec![i]);
        }
    }

    #[test]
    fn test_backend_failure_names_island() {
        let calls = [call(100, 200, "A"), call(105, 205, "B"), call(110, 250, "C")];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let err = DensityClustering::new(0.5, Box::new(Failing)).cluster(&refs).unwrap_err();
        match err {
            MergeError::ExternalClusteringFailure { island, reason } => {
                assert_eq!(island, "chr1:100-250");
                assert!(reason.contains("script crashed"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_label_is_failure() {
        let calls = [call(100, 200, "A"), call(105, 205, "B"), call(110, 250, "C")];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let err = scripted(vec![1, 1]).cluster(&refs).unwrap_err();
        assert!(matches!(err, MergeError::ExternalClusteringFailure { .. }));
    }

    #[test]
    fn test_resolve_labels_rejects_unknown_and_duplicate() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let unknown = [
            Assignment { id: "a".to_string(), cluster: 1 },
            Assignment { id: "z".to_string(), cluster: 1 },
        ];
        assert!(resolve_labels(&ids, &unknown).unwrap_err().contains("unknown"));

        let dup = [
            Assignment { id: "a".to_string(), cluster: 1 },
            Assignment { id: "a".to_string(), cluster: 2 },
        ];
        assert!(resolve_labels(&ids, &dup).unwrap_err().contains("more than once"));
    }

    #[test]
    fn test_identical_calls_get_distinct_ids() {
        let a = call(100, 200, "A");
        let ids = DensityClustering::island_ids(&[&a, &a, &a]);
        assert_eq!(ids, vec!["A_chr1_100_200_1", "A_chr1_100_200_1_2", "A_chr1_100_200_1_3"]);
    }

    #[test]
    fn test_native_backend_end_to_end() {
        let calls = [call(100, 200, "A"), call(105, 205, "B"), call(110, 210, "C"), call(5000, 9000, "D")];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let d = DensityClustering::new(0.2, Box::new(NativeDbscan::new(2)));
        let clusters = d.cluster(&refs).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[&1].members, vec![0, 1, 2]);
        assert_eq!(clusters[&2].members, vec![3]);
    }
}
