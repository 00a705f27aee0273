//! Half-open genomic intervals.

use std::fmt;

/// A 0-based, half-open interval `[start, end)` on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    pub chrom: String,
    pub start: u32,
    pub end: u32,
}

impl GenomicInterval {
    pub fn new(chrom: &str, start: u32, end: u32) -> Self {
        debug_assert!(start < end, "interval {}:{}-{} is empty", chrom, start, end);
        Self { chrom: chrom.to_string(), start, end }
    }

    pub fn length(&self) -> u32 {
        self.end - self.start
    }

    /// True if both intervals are on the same chromosome and share at least one base.
    pub fn intersects(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }

    /// Number of shared bases, 0 for disjoint intervals.
    pub fn intersection_length(&self, other: &GenomicInterval) -> u32 {
        if !self.intersects(other) {
            return 0;
        }
        self.end.min(other.end) - self.start.max(other.start)
    }

    /// Smallest interval containing both. Callers only union intervals on one chromosome.
    pub fn union(&self, other: &GenomicInterval) -> GenomicInterval {
        debug_assert_eq!(self.chrom, other.chrom);
        GenomicInterval {
            chrom: self.chrom.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}
