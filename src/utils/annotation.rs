//! Gene and pathogenic-locus annotation of merged loci.
//!
//! Both indices key chromosomes without their `chr` prefix so tables written with
//! either naming style match calls written with the other.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::str::FromStr;

use indexmap::IndexSet;
use log::info;

use crate::cnv::call::CopyType;
use crate::error::{MergeError, MergeResult};
use crate::utils::bed::{BedRegion, read_bed};
use crate::utils::contig::strip_chr_prefix;
use crate::utils::interval_index::{IndexedInterval, IntervalIndex};

/// Calls longer than this are always flagged as `LargeDel` / `LargeDup`.
pub const LARGE_CNV_LENGTH: u32 = 25_000_000;

/// Tie-break order when a locus hits several pathogenic regions.
pub const PATHOGENIC_PRIORITY: [&str; 6] = ["LargeDel", "LargeDup", "15q13.3del", "15q13.3dup", "2q13del", "2q13dup"];

pub trait GeneAnnotator {
    /// Names of genes overlapping `[start, end)`, each once.
    fn overlapping_genes(&self, chrom: &str, start: u32, end: u32) -> Vec<String>;
}

pub trait PathogenicAnnotator {
    /// Names of pathogenic loci matched by a CNV of `copy_type` spanning `[start, end)`.
    fn overlapping_loci(
        &self,
        chrom: &str,
        start: u32,
        end: u32,
        genes: &[String],
        copy_type: CopyType,
    ) -> MergeResult<Vec<String>>;
}

/// Annotator for runs without gene or pathogenic tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotation;

impl GeneAnnotator for NoAnnotation {
    fn overlapping_genes(&self, _chrom: &str, _start: u32, _end: u32) -> Vec<String> {
        Vec::new()
    }
}

impl PathogenicAnnotator for NoAnnotation {
    fn overlapping_loci(&self, _: &str, _: u32, _: u32, _: &[String], _: CopyType) -> MergeResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Collapse a set of pathogenic hits into the single name reported in the VCF.
///
/// One hit is reported as is; several are resolved through `PATHOGENIC_PRIORITY`, and
/// an unresolvable combination reports nothing.
pub fn resolve_pathogenic(hits: &[String]) -> Option<String> {
    match hits {
        [] => None,
        [only] => Some(only.clone()),
        _ => PATHOGENIC_PRIORITY
            .iter()
            .find(|&&p| hits.iter().any(|h| h == p))
            .map(|p| p.to_string()),
    }
}

// ============================================================================
// Genes
// ============================================================================

pub struct GeneIndex {
    index: IntervalIndex<String>,
}

impl GeneIndex {
    pub fn from_regions(regions: Vec<BedRegion>) -> Self {
        let entries = regions
            .into_iter()
            .filter(|r| r.start < r.end)
            .map(|r| IndexedInterval {
                chrom: strip_chr_prefix(&r.chrom).to_string(),
                start: r.start,
                end: r.end,
                value: r.name,
            })
            .collect();
        Self { index: IntervalIndex::build(entries) }
    }

    pub fn load(bed_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let index = Self::from_regions(read_bed(bed_path)?);
        info!("Loaded {} gene intervals from {}", index.len(), bed_path);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl GeneAnnotator for GeneIndex {
    fn overlapping_genes(&self, chrom: &str, start: u32, end: u32) -> Vec<String> {
        let names: IndexSet<&str> = self
            .index
            .overlapping(strip_chr_prefix(chrom), start, end)
            .into_iter()
            .map(|e| e.value.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }
}

// ============================================================================
// Pathogenic loci
// ============================================================================

/// How a CNV must relate to a pathogenic locus to be reported against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathogenicRule {
    /// More than half the locus covered
    Fifty,
    /// More than 95% of the locus covered
    OneHundred,
    /// More than half covered and every required gene hit
    GeneRequired,
    /// CNV of at least 1 Mb hitting every required gene
    MbGene,
    /// More than 95% of the locus covered
    Dup,
    /// Any exon of the locus hit
    Exons,
    /// At least 1 Mb of the locus covered
    Mb,
    /// At least 1 Mb of the locus covered
    SegDup,
}

impl FromStr for PathogenicRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIFTY" => Ok(PathogenicRule::Fifty),
            "ONEHUNDRED" => Ok(PathogenicRule::OneHundred),
            "GENEREQUIRED" => Ok(PathogenicRule::GeneRequired),
            "MBGENE" => Ok(PathogenicRule::MbGene),
            "DUP" => Ok(PathogenicRule::Dup),
            "EXONS" => Ok(PathogenicRule::Exons),
            "MB" => Ok(PathogenicRule::Mb),
            "SEGDUP" => Ok(PathogenicRule::SegDup),
            other => Err(format!("Unknown pathogenic rule type: {}", other)),
        }
    }
}

const ONE_MB: u32 = 1_000_000;

#[derive(Debug, Clone)]
pub struct PathogenicLocus {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub copy_number: i32,
    pub rule: PathogenicRule,
    pub required_genes: Vec<String>,
    /// Half-open exon intervals in genome coordinates
    pub exons: Vec<(u32, u32)>,
}

impl PathogenicLocus {
    pub fn length(&self) -> u32 {
        self.end - self.start
    }

    fn matches_class(&self, copy_type: CopyType) -> bool {
        match copy_type {
            CopyType::Del => self.copy_number < 2,
            CopyType::Dup => self.copy_number > 2,
        }
    }

    fn hits_exon(&self, start: u32, end: u32) -> bool {
        self.exons.iter().any(|&(s, e)| s < end && start < e)
    }

    fn has_genes(&self, genes: &[String]) -> bool {
        self.required_genes.iter().all(|g| genes.contains(g))
    }

    /// Whether a CNV `[start, end)` with overlap `(bp, fraction)` satisfies this locus' rule.
    fn accepts(&self, start: u32, end: u32, bp: u32, fraction: f64, genes: &[String]) -> bool {
        match self.rule {
            PathogenicRule::Fifty => fraction > 0.5,
            PathogenicRule::OneHundred | PathogenicRule::Dup => fraction > 0.95,
            PathogenicRule::GeneRequired => fraction > 0.5 && self.has_genes(genes),
            PathogenicRule::MbGene => end - start >= ONE_MB && self.has_genes(genes),
            PathogenicRule::Exons => self.hits_exon(start, end),
            PathogenicRule::Mb | PathogenicRule::SegDup => bp >= ONE_MB,
        }
    }
}

/// Covered base pairs of the locus and the covered fraction of its length.
///
/// Fails if the CNV and the locus do not actually overlap.
pub fn locus_overlap(start: u32, end: u32, locus_start: u32, locus_end: u32) -> MergeResult<(u32, f64)> {
    let locus_len = (locus_end - locus_start) as f64;
    let bp = if start <= locus_start && end >= locus_end {
        // Locus fully covered
        Some(locus_end - locus_start)
    } else if start >= locus_start && end <= locus_end {
        // CNV inside the locus
        Some(end - start)
    } else if end > locus_end {
        // Overhangs the right edge
        locus_end.checked_sub(start).filter(|&bp| bp > 0)
    } else {
        // Overhangs the left edge
        end.checked_sub(locus_start).filter(|&bp| bp > 0)
    };

    match bp {
        Some(bp) if bp > 0 => Ok((bp, bp as f64 / locus_len)),
        _ => Err(MergeError::GeometryInvariantViolation(format!(
            "{}-{} vs locus {}-{}",
            start, end, locus_start, locus_end
        ))),
    }
}

/// Pathogenic loci split into deletion and duplication indices.
pub struct PathogenicIndex {
    del: IntervalIndex<PathogenicLocus>,
    dup: IntervalIndex<PathogenicLocus>,
}

fn parse_gene_list(field: &str) -> Vec<String> {
    if field == "null" || field.is_empty() {
        return Vec::new();
    }
    field.split(',').filter(|g| !g.is_empty()).map(str::to_string).collect()
}

fn parse_exons(anchor: &str, lengths: &str, starts: &str) -> Result<Vec<(u32, u32)>, String> {
    if anchor == "null" || anchor.is_empty() {
        return Ok(Vec::new());
    }
    let anchor: u32 = anchor.parse().map_err(|e| format!("Invalid exon anchor {}: {}", anchor, e))?;
    let lengths: Vec<&str> = lengths.split(',').collect();
    let starts: Vec<&str> = starts.split(',').collect();
    if lengths.len() != starts.len() {
        return Err(format!("{} exon lengths but {} exon starts", lengths.len(), starts.len()));
    }
    starts
        .iter()
        .zip(&lengths)
        .map(|(s, l)| {
            let offset: u32 = s.parse().map_err(|e| format!("Invalid exon start {}: {}", s, e))?;
            let len: u32 = l.parse().map_err(|e| format!("Invalid exon length {}: {}", l, e))?;
            let exon_start = anchor + offset;
            Ok((exon_start, exon_start + len))
        })
        .collect()
}

impl PathogenicIndex {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)
            .map_err(|e| std::io::Error::other(format!("Error opening pathogenic table {}: {}", path, e)))?;
        let index = Self::from_reader(BufReader::new(file))?;
        info!("Loaded {} pathogenic loci from {}", index.len(), path);
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Box<dyn std::error::Error>> {
        let mut del = Vec::new();
        let mut dup = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 10 {
                return Err(format!(
                    "Malformed pathogenic line {} (expected 10 columns, got {}): {}",
                    i + 1,
                    parts.len(),
                    line
                )
                .into());
            }
            let start: u32 = parts[1].parse().map_err(|e| format!("Invalid start at line {}: {}", i + 1, e))?;
            let end: u32 = parts[2].parse().map_err(|e| format!("Invalid end at line {}: {}", i + 1, e))?;
            if start >= end {
                return Err(format!("Empty pathogenic locus at line {}", i + 1).into());
            }
            let copy_number: i32 = parts[4]
                .parse()
                .map_err(|e| format!("Invalid copy number at line {}: {}", i + 1, e))?;
            let rule: PathogenicRule = parts[5].parse()?;
            let exons = parse_exons(parts[7], parts[8], parts[9]).map_err(|e| format!("Line {}: {}", i + 1, e))?;

            let entry = IndexedInterval {
                chrom: strip_chr_prefix(parts[0]).to_string(),
                start,
                end,
                value: PathogenicLocus {
                    name: parts[3].to_string(),
                    start,
                    end,
                    copy_number,
                    rule,
                    required_genes: parse_gene_list(parts[6]),
                    exons,
                },
            };
            if copy_number == 3 {
                dup.push(entry);
            } else {
                del.push(entry);
            }
        }

        Ok(Self { del: IntervalIndex::build(del), dup: IntervalIndex::build(dup) })
    }

    pub fn len(&self) -> usize {
        self.del.len() + self.dup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PathogenicAnnotator for PathogenicIndex {
    fn overlapping_loci(
        &self,
        chrom: &str,
        start: u32,
        end: u32,
        genes: &[String],
        copy_type: CopyType,
    ) -> MergeResult<Vec<String>> {
        let index = match copy_type {
            CopyType::Del => &self.del,
            CopyType::Dup => &self.dup,
        };

        let mut loci = BTreeSet::new();
        for hit in index.overlapping(strip_chr_prefix(chrom), start, end) {
            let locus = &hit.value;
            let (bp, fraction) = locus_overlap(start, end, locus.start, locus.end)?;
            if locus.matches_class(copy_type) && locus.accepts(start, end, bp, fraction, genes) {
                loci.insert(locus.name.clone());
            }
        }

        if end - start > LARGE_CNV_LENGTH {
            loci.insert(match copy_type {
                CopyType::Del => "LargeDel".to_string(),
                CopyType::Dup => "LargeDup".to_string(),
            });
        }
        Ok(loci.into_iter().collect())
    }
}
