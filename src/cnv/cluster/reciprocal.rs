use std::collections::BTreeMap;

use super::{Cluster, ClusterKind, ClusterMap, Clusterer};
use crate::cnv::call::CnvCall;
use crate::cnv::similarity::SimilarityMatrix;
use crate::error::MergeResult;

/// Joins calls whose overlap reaches `threshold` in both directions, transitively.
#[derive(Debug, Clone)]
pub struct ReciprocalClustering {
    threshold: f64,
}

impl ReciprocalClustering {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

impl Clusterer for ReciprocalClustering {
    fn cluster(&self, island: &[&CnvCall]) -> MergeResult<ClusterMap> {
        let n = island.len();
        let matrix = SimilarityMatrix::overlap(island);

        let mut parent: Vec<usize> = (0..n).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                if matrix.get(i, j) >= self.threshold && matrix.get(j, i) >= self.threshold {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        // Smaller root wins so component ids follow island order
                        parent[ri.max(rj)] = ri.min(rj);
                    }
                }
            }
        }

        // Components keyed by their first member
        let mut by_root: BTreeMap<usize, Cluster> = BTreeMap::new();
        for (pos, call) in island.iter().enumerate() {
            let root = find(&mut parent, pos);
            match by_root.get_mut(&root) {
                Some(cluster) => cluster.absorb(pos, call),
                None => {
                    by_root.insert(root, Cluster::singleton(pos, call));
                }
            }
        }
        Ok(super::compact(by_root))
    }

    fn kind(&self) -> ClusterKind {
        ClusterKind::Reciprocal
    }

    fn parameter(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnv::interval::GenomicInterval;

    fn call(start: u32, end: u32) -> CnvCall {
        CnvCall::new("chr1", start, end, 1, 10, 10.0, "S")
    }

    #[test]
    fn test_transitive_components() {
        // a~b and b~c reciprocally, d only touches c
        let calls = [call(100, 200), call(120, 220), call(140, 240), call(230, 1000)];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let clusters = ReciprocalClustering::new(0.5).cluster(&refs).unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[&1].members, vec![0, 1, 2]);
        assert_eq!(clusters[&1].interval, GenomicInterval::new("chr1", 100, 240));
        assert_eq!(clusters[&2].members, vec![3]);
        assert_eq!(clusters[&2].interval, GenomicInterval::new("chr1", 230, 1000));
    }

    #[test]
    fn test_union_contains_members() {
        let calls = [call(0, 100), call(10, 90), call(20, 130), call(500, 600), call(510, 590)];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let clusters = ReciprocalClustering::new(0.5).cluster(&refs).unwrap();
        let mut seen = 0;
        for c in clusters.values() {
            for &m in &c.members {
                assert!(c.interval.contains(&calls[m].interval));
                seen += 1;
            }
        }
        assert_eq!(seen, calls.len());
    }

    #[test]
    fn test_reclustering_collapsed_island_is_stable() {
        let calls = [call(100, 200), call(110, 210), call(105, 205)];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let clusterer = ReciprocalClustering::new(0.5);
        let first = clusterer.cluster(&refs).unwrap();
        assert_eq!(first.len(), 1);

        let again = clusterer.cluster(&refs).unwrap();
        assert_eq!(again[&1].interval, first[&1].interval);
        assert_eq!(again[&1].interval, GenomicInterval::new("chr1", 100, 210));
    }

    #[test]
    fn test_single_call() {
        let calls = [call(100, 200)];
        let refs: Vec<&CnvCall> = calls.iter().collect();
        let clusters = ReciprocalClustering::new(0.5).cluster(&refs).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[&1].members, vec![0]);
    }
}
