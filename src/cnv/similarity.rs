//! Pairwise directional overlap between the calls of one island.

use std::io::{self, Write};

use super::call::CnvCall;
use super::interval::GenomicInterval;
use crate::utils::number::format_trimmed;

/// Distance cut-off used by the closed-form doubleton decision; a pair merges only below it.
pub const DOUBLETON_MAX_DISTANCE: f64 = 0.5;

/// Fraction of `a` covered by `b`.
pub fn overlap_fraction(a: &GenomicInterval, b: &GenomicInterval) -> f64 {
    if !a.intersects(b) {
        return 0.0;
    }
    a.intersection_length(b) as f64 / a.length() as f64
}

/// `n x n` matrix where row `i`, column `j` holds the fraction of call `i` covered by call `j`.
///
/// In distance mode every cell holds `1 - overlap` instead.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f64>,
    distance: bool,
}

impl SimilarityMatrix {
    fn build(calls: &[&CnvCall], distance: bool) -> Self {
        let n = calls.len();
        let mut values = vec![0.0; n * n];
        for (i, a) in calls.iter().enumerate() {
            for (j, b) in calls.iter().enumerate() {
                let ov = overlap_fraction(&a.interval, &b.interval);
                values[i * n + j] = if distance { 1.0 - ov } else { ov };
            }
        }
        Self { n, values, distance }
    }

    pub fn overlap(calls: &[&CnvCall]) -> Self {
        Self::build(calls, false)
    }

    pub fn distance(calls: &[&CnvCall]) -> Self {
        Self::build(calls, true)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn is_distance(&self) -> bool {
        self.distance
    }

    /// Write as a tab-delimited table with `ids` as both header row and first column.
    pub fn write_tsv<W: Write>(&self, ids: &[String], out: &mut W) -> io::Result<()> {
        debug_assert_eq!(ids.len(), self.n);
        write!(out, "ID")?;
        for id in ids {
            write!(out, "\t{}", id)?;
        }
        writeln!(out)?;
        for (i, id) in ids.iter().enumerate() {
            write!(out, "{}", id)?;
            for j in 0..self.n {
                write!(out, "\t{}", format_trimmed(self.get(i, j), 6))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Closed-form decision for exactly two calls: same event iff both directional distances
/// are strictly below one half, so a pair overlapping by exactly half stays split.
pub fn doubleton_merges(a: &CnvCall, b: &CnvCall) -> bool {
    let m = SimilarityMatrix::distance(&[a, b]);
    m.get(0, 1) < DOUBLETON_MAX_DISTANCE && m.get(1, 0) < DOUBLETON_MAX_DISTANCE
}
