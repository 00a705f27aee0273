//! Overlap islands: maximal runs of calls connected by positive overlap.

use indexmap::IndexMap;
use log::debug;

use super::call::{CnvCall, CopyType};
use super::interval::GenomicInterval;
use crate::utils::contig::sort_chromosomes;
use crate::utils::interval_index::{IndexedInterval, IntervalIndex};

/// Indices (into the caller's call slice) of one island's members, sorted by start then end.
pub type IslandMembers = Vec<usize>;

/// Islands of one copy type, indexed by envelope and iterated chromosome by
/// chromosome in natural order, envelopes ascending within a chromosome.
pub struct IslandIndex {
    index: IntervalIndex<IslandMembers>,
}

impl IslandIndex {
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.index.chromosomes()
    }

    /// Islands of one chromosome as `(envelope, members)`.
    pub fn islands<'a>(&'a self, chrom: &str) -> impl Iterator<Item = (GenomicInterval, &'a IslandMembers)> + use<'a> {
        self.index
            .on_chrom(chrom)
            .map(|e| (GenomicInterval::new(&e.chrom, e.start, e.end), &e.value))
    }

    /// Islands whose envelope overlaps `[start, end)`.
    pub fn query(&self, chrom: &str, start: u32, end: u32) -> Vec<(GenomicInterval, &IslandMembers)> {
        self.index
            .overlapping(chrom, start, end)
            .into_iter()
            .map(|e| (GenomicInterval::new(&e.chrom, e.start, e.end), &e.value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Sweep one chromosome's calls into islands.
///
/// `members` index into `calls`; the result holds `(envelope, members)` in envelope order.
/// A call joins the open island when its start lies strictly before the envelope end.
pub fn sweep_islands(calls: &[CnvCall], members: &[usize]) -> Vec<(GenomicInterval, IslandMembers)> {
    let mut order: Vec<usize> = members.to_vec();
    order.sort_by_key(|&i| (calls[i].start(), calls[i].end()));

    let mut islands = Vec::new();
    let mut current: Option<(GenomicInterval, IslandMembers)> = None;

    for i in order {
        let call = &calls[i];
        let extends = matches!(&current, Some((env, _)) if call.start() < env.end);
        if extends {
            if let Some((env, acc)) = current.as_mut() {
                env.end = env.end.max(call.end());
                acc.push(i);
            }
        } else {
            if let Some(done) = current.take() {
                islands.push(done);
            }
            current = Some((call.interval.clone(), vec![i]));
        }
    }
    if let Some(done) = current {
        islands.push(done);
    }
    islands
}

/// Group every call of `copy_type` into islands, per chromosome.
pub fn group_islands(calls: &[CnvCall], copy_type: CopyType) -> IslandIndex {
    let mut by_chrom: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (i, call) in calls.iter().enumerate() {
        if call.copy_type() == copy_type {
            by_chrom.entry(call.chrom().to_string()).or_default().push(i);
        }
    }

    let chroms = sort_chromosomes(by_chrom.keys().cloned());
    let mut entries = Vec::new();
    for chrom in chroms {
        let members = &by_chrom[&chrom];
        let islands = sweep_islands(calls, members);
        debug!("{} {}: {} calls in {} islands", copy_type, chrom, members.len(), islands.len());
        for (env, acc) in islands {
            entries.push(IndexedInterval { chrom: env.chrom, start: env.start, end: env.end, value: acc });
        }
    }

    IslandIndex { index: IntervalIndex::build(entries) }
}
