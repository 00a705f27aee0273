//! Chromosome naming and ordering utilities.
//!
//! Merge-group ids are handed out in chromosome traversal order, so every place that
//! iterates chromosomes goes through `sort_chromosomes` to keep output reproducible.

use std::cmp::Ordering;

/// Sort rank of a chromosome name: autosomes numerically, then X, Y, mitochondrial,
/// then anything else (unplaced contigs, alt haplotypes) by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ChromRank {
    Autosome(u32),
    X,
    Y,
    Mito,
    Other(String),
}

/// Strip a leading `chr`/`Chr`/`CHR` prefix.
pub fn strip_chr_prefix(name: &str) -> &str {
    match (name.get(..3), name.get(3..)) {
        (Some(prefix), Some(rest)) if !rest.is_empty() && prefix.eq_ignore_ascii_case("chr") => rest,
        _ => name,
    }
}

fn rank(name: &str) -> ChromRank {
    let bare = strip_chr_prefix(name);
    if let Ok(n) = bare.parse::<u32>() {
        return ChromRank::Autosome(n);
    }
    match bare {
        "X" | "x" => ChromRank::X,
        "Y" | "y" => ChromRank::Y,
        "M" | "MT" | "m" | "mt" => ChromRank::Mito,
        _ => ChromRank::Other(bare.to_string()),
    }
}

/// Natural karyotype comparison (`chr2` before `chr10`, `X` after `22`).
pub fn compare_chromosomes(a: &str, b: &str) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

/// Collect and sort chromosome names in natural order, dropping duplicates.
pub fn sort_chromosomes<I: IntoIterator<Item = String>>(names: I) -> Vec<String> {
    let mut v: Vec<String> = names.into_iter().collect();
    v.sort_by(|a, b| compare_chromosomes(a, b));
    v.dedup();
    v
}
