//! Chromosome-keyed interval index backed by cache-oblivious interval trees.
//!
//! Intervals are stored half-open (`[start, end)`) and translated to the closed
//! coordinates `coitrees` works with on the way in and out.

use coitrees::{COITree, Interval, IntervalTree};
use indexmap::IndexMap;

/// One stored interval and its payload.
#[derive(Debug, Clone)]
pub struct IndexedInterval<T> {
    pub chrom: String,
    pub start: u32,
    pub end: u32,
    pub value: T,
}

struct ChromTree {
    /// Entry ids on this chromosome, in insertion order
    ids: Vec<usize>,
    tree: COITree<usize, u32>,
}

/// Overlap index over intervals on many chromosomes.
///
/// Chromosomes iterate in the order they were first inserted, and entries within a
/// chromosome in insertion order, so callers control traversal order by sorting first.
pub struct IntervalIndex<T> {
    entries: Vec<IndexedInterval<T>>,
    chroms: IndexMap<String, ChromTree>,
}

impl<T> IntervalIndex<T> {
    pub fn build(entries: Vec<IndexedInterval<T>>) -> Self {
        let mut grouped: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (id, e) in entries.iter().enumerate() {
            grouped.entry(e.chrom.clone()).or_default().push(id);
        }

        let chroms = grouped
            .into_iter()
            .map(|(chrom, ids)| {
                let nodes: Vec<Interval<usize>> = ids
                    .iter()
                    .map(|&id| {
                        let e = &entries[id];
                        let last = e.end.saturating_sub(1).max(e.start);
                        Interval::new(e.start as i32, last as i32, id)
                    })
                    .collect();
                let tree: COITree<usize, u32> = COITree::new(&nodes);
                (chrom, ChromTree { ids, tree })
            })
            .collect();

        Self { entries, chroms }
    }

    /// Entries overlapping `[start, end)` on `chrom`, in insertion order.
    pub fn overlapping(&self, chrom: &str, start: u32, end: u32) -> Vec<&IndexedInterval<T>> {
        if end <= start {
            return Vec::new();
        }
        let Some(ct) = self.chroms.get(chrom) else {
            return Vec::new();
        };

        let mut hits: Vec<usize> = Vec::new();
        ct.tree.query(start as i32, (end - 1) as i32, |node| {
            hits.push(node.metadata.clone());
        });
        hits.sort_unstable();
        hits.into_iter().map(|id| &self.entries[id]).collect()
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.chroms.keys().map(|k| k.as_str())
    }

    /// All entries on one chromosome, in insertion order.
    pub fn on_chrom<'a>(&'a self, chrom: &str) -> impl Iterator<Item = &'a IndexedInterval<T>> + use<'a, T> {
        let ids: &'a [usize] = match self.chroms.get(chrom) {
            Some(ct) => &ct.ids,
            None => &[],
        };
        ids.iter().map(move |&id| &self.entries[id])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
