//! Reference sequence access: single-base lookups and contig lengths.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use noodles::fasta;

use crate::error::{MergeError, MergeResult};
use crate::utils::contig::strip_chr_prefix;

pub trait ReferenceAccessor {
    /// Base at 0-based position `pos`, upper-cased.
    fn base(&mut self, chrom: &str, pos: u32) -> MergeResult<char>;

    /// Contig length, if the contig is known.
    fn length(&self, chrom: &str) -> Option<u64>;
}

/// Parse `name\tlength\t...` lines of a FASTA index.
pub fn read_fai_lengths<R: BufRead>(reader: R) -> std::io::Result<IndexMap<String, u64>> {
    let mut lengths = IndexMap::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split('\t');
        let name = parts.next().unwrap_or_default();
        let length = parts
            .next()
            .and_then(|l| l.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Malformed FASTA index line {}: {}", i + 1, line),
                )
            })?;
        lengths.insert(name.to_string(), length);
    }
    Ok(lengths)
}

/// Find the reference's spelling of `chrom`, tolerating a missing or extra `chr` prefix.
fn resolve_name<'a, V>(names: &'a IndexMap<String, V>, chrom: &str) -> Option<&'a str> {
    if let Some((name, _)) = names.get_key_value(chrom) {
        return Some(name.as_str());
    }
    let bare = strip_chr_prefix(chrom);
    [bare.to_string(), format!("chr{}", bare)]
        .iter()
        .find_map(|candidate| names.get_key_value(candidate.as_str()))
        .map(|(name, _)| name.as_str())
}

/// Indexed FASTA reader with lengths taken from its `.fai`.
pub struct FastaReference<R> {
    reader: fasta::io::IndexedReader<R>,
    lengths: IndexMap<String, u64>,
}

/// Open an indexed FASTA (`<path>.fai` must exist).
pub fn open_fasta(path: &str) -> Result<Box<dyn ReferenceAccessor>> {
    let reader = fasta::io::indexed_reader::Builder::default()
        .build_from_path(path)
        .with_context(|| format!("Error opening FASTA file {}", path))?;

    let fai_path = format!("{}.fai", path);
    let fai = File::open(&fai_path).with_context(|| format!("Error opening FASTA index {}", fai_path))?;
    let lengths = read_fai_lengths(BufReader::new(fai))?;
    info!("FASTA index: {} sequences", lengths.len());

    Ok(Box::new(FastaReference { reader, lengths }))
}

impl<R: BufRead + Seek> ReferenceAccessor for FastaReference<R> {
    fn base(&mut self, chrom: &str, pos: u32) -> MergeResult<char> {
        let name = resolve_name(&self.lengths, chrom)
            .ok_or_else(|| MergeError::Reference(format!("contig {} not in reference", chrom)))?
            .to_string();

        // Regions are 1-based inclusive
        let region_str = format!("{}:{}-{}", name, pos + 1, pos + 1);
        let region: noodles::core::Region = region_str
            .parse()
            .map_err(|e| MergeError::Reference(format!("invalid region {}: {}", region_str, e)))?;
        let record = self
            .reader
            .query(&region)
            .map_err(|e| MergeError::Reference(format!("query {} failed: {}", region_str, e)))?;
        let seq = record.sequence().as_ref();
        match seq.first() {
            Some(b) => Ok(b.to_ascii_uppercase() as char),
            None => {
                debug!("Empty sequence returned for {}", region_str);
                Err(MergeError::Reference(format!("no base at {}", region_str)))
            }
        }
    }

    fn length(&self, chrom: &str) -> Option<u64> {
        resolve_name(&self.lengths, chrom).and_then(|name| self.lengths.get(name).copied())
    }
}

/// Reference held in memory, keyed by contig name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    sequences: IndexMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contig(mut self, name: &str, sequence: &str) -> Self {
        self.sequences.insert(name.to_string(), sequence.as_bytes().to_vec());
        self
    }
}

impl ReferenceAccessor for InMemoryReference {
    fn base(&mut self, chrom: &str, pos: u32) -> MergeResult<char> {
        let name = resolve_name(&self.sequences, chrom)
            .ok_or_else(|| MergeError::Reference(format!("contig {} not in reference", chrom)))?;
        self.sequences[name]
            .get(pos as usize)
            .map(|b| b.to_ascii_uppercase() as char)
            .ok_or_else(|| MergeError::Reference(format!("position {} beyond end of {}", pos, chrom)))
    }

    fn length(&self, chrom: &str) -> Option<u64> {
        resolve_name(&self.sequences, chrom).map(|name| self.sequences[name].len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_read_fai_lengths() {
        let data = "chr1\t248956422\t112\t70\t71\nchr2\t242193529\t252513167\t70\t71\n";
        let lengths = read_fai_lengths(Cursor::new(data)).unwrap();
        assert_eq!(lengths.len(), 2);
        assert_eq!(lengths["chr1"], 248956422);
        assert_eq!(lengths.get_index(1).map(|(k, _)| k.as_str()), Some("chr2"));

        assert!(read_fai_lengths(Cursor::new("chr1\tabc\n")).is_err());
    }

    #[test]
    fn test_resolve_name_prefix_tolerant() {
        let mut names = IndexMap::new();
        names.insert("chr1".to_string(), 10u64);
        names.insert("7".to_string(), 5u64);
        assert_eq!(resolve_name(&names, "chr1"), Some("chr1"));
        assert_eq!(resolve_name(&names, "1"), Some("chr1"));
        assert_eq!(resolve_name(&names, "chr7"), Some("7"));
        assert_eq!(resolve_name(&names, "2"), None);
    }

    #[test]
    fn test_in_memory_reference() {
        let mut reference = InMemoryReference::new().with_contig("chr1", "acgtNACGT");
        assert_eq!(reference.base("chr1", 0).unwrap(), 'A');
        assert_eq!(reference.base("1", 4).unwrap(), 'N');
        assert_eq!(reference.length("chr1"), Some(9));
        assert!(matches!(reference.base("chr1", 9), Err(MergeError::Reference(_))));
        assert!(reference.base("chr2", 0).is_err());
        assert_eq!(reference.length("chr2"), None);
    }

    #[test]
    fn test_fasta_reference() {
        let dir = tempfile::tempdir().unwrap();
        let fasta_path = dir.path().join("ref.fa");
        let mut fa = File::create(&fasta_path).unwrap();
        write!(fa, ">chr1\nACGTACGTAC\nGGGGTTTTCC\n>chr2\nttttaaaa\n").unwrap();
        // 20 bases in lines of 10 (11 bytes with newline); sequence starts after ">chr1\n"
        let mut fai = File::create(dir.path().join("ref.fa.fai")).unwrap();
        write!(fai, "chr1\t20\t6\t10\t11\nchr2\t8\t34\t8\t9\n").unwrap();

        let mut reference = open_fasta(fasta_path.to_str().unwrap()).unwrap();
        assert_eq!(reference.length("chr1"), Some(20));
        assert_eq!(reference.length("2"), Some(8));
        assert_eq!(reference.base("chr1", 0).unwrap(), 'A');
        assert_eq!(reference.base("chr1", 3).unwrap(), 'T');
        assert_eq!(reference.base("chr1", 10).unwrap(), 'G');
        assert_eq!(reference.base("chr2", 4).unwrap(), 'A');
        assert!(reference.base("chrZ", 0).is_err());
    }
}
