//! Readers for the processed-call table and the optional sample list.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::cnv::call::CnvCall;
use crate::config::InputConfig;
use crate::utils::contig::sort_chromosomes;

/// Calls loaded from one processed-call table.
#[derive(Debug, Default)]
pub struct CallTable {
    pub calls: Vec<CnvCall>,
    /// Every chromosome seen in the table, filtered rows included, in karyotype order
    pub chromosomes: Vec<String>,
    /// Rows dropped by the pass filter
    pub filtered: usize,
}

impl CallTable {
    /// Distinct sample ids among the kept calls, sorted.
    pub fn samples(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|c| c.sample.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Boolean column as written by the upstream QC step: `true` in any case, anything else is false.
fn parse_pass(field: &str) -> bool {
    field.trim().eq_ignore_ascii_case("true")
}

/// Sample id from a per-sample path column: its final path component.
fn sample_from_path(field: &str) -> String {
    Path::new(field)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| field.to_string())
}

pub fn read_calls(path: &str, config: &InputConfig) -> Result<CallTable> {
    let file = File::open(path).with_context(|| format!("Error opening call table {}", path))?;
    let table = read_calls_from_reader(BufReader::new(file), config)?;
    info!(
        "Loaded {} calls ({} filtered) on {} chromosomes from {}",
        table.calls.len(),
        table.filtered,
        table.chromosomes.len(),
        path
    );
    Ok(table)
}

pub fn read_calls_from_reader<R: BufRead>(reader: R, config: &InputConfig) -> Result<CallTable> {
    let cols = &config.columns;
    let width = cols.required_width();
    let mut table = CallTable::default();
    let mut chromosomes = BTreeSet::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < width {
            bail!(
                "Malformed call line {} (expected at least {} columns, got {})",
                line_no,
                width,
                parts.len()
            );
        }

        let chrom = parts[cols.chrom];
        chromosomes.insert(chrom.to_string());

        if config.filter && !parse_pass(parts[cols.pass]) {
            table.filtered += 1;
            continue;
        }

        let start: u32 = parts[cols.start]
            .parse()
            .with_context(|| format!("Invalid start at line {}", line_no))?;
        let end: u32 = parts[cols.end]
            .parse()
            .with_context(|| format!("Invalid end at line {}", line_no))?;
        if start >= end {
            bail!("Empty or inverted interval at line {}: {}-{}", line_no, start, end);
        }
        let copy_number: i32 = parts[cols.copy_number]
            .parse()
            .with_context(|| format!("Invalid copy number at line {}", line_no))?;
        let probe_count: u32 = parts[cols.probe_count]
            .parse()
            .with_context(|| format!("Invalid probe count at line {}", line_no))?;
        let confidence: f64 = parts[cols.confidence]
            .parse()
            .with_context(|| format!("Invalid confidence at line {}", line_no))?;
        let sample = sample_from_path(parts[cols.sample]);

        table.calls.push(
            CnvCall::new(chrom, start, end, copy_number, probe_count, confidence, &sample)
                .with_record(line.clone()),
        );
    }

    table.chromosomes = sort_chromosomes(chromosomes);
    debug!("Call table chromosomes: {:?}", table.chromosomes);
    Ok(table)
}

/// Sample list, one id per line. Blank lines and `#` comments are ignored; ids are sorted and deduplicated.
pub fn read_samples(path: &str) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Error opening sample list {}", path))?;
    read_samples_from_reader(BufReader::new(file))
}

pub fn read_samples_from_reader<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut samples = BTreeSet::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        samples.insert(id.to_string());
    }
    Ok(samples.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;
    use std::io::Cursor;

    /// Compact 7-column layout: chrom start end sample cn probes pass, confidence last.
    fn compact_config(filter: bool) -> InputConfig {
        InputConfig {
            columns: ColumnConfig {
                chrom: 0,
                start: 1,
                end: 2,
                sample: 3,
                copy_number: 4,
                probe_count: 5,
                pass: 6,
                confidence: 7,
            },
            filter,
        }
    }

    const TABLE: &str = "\
chr2\t100\t200\t/data/calls/S1.txt\t1\t12\ttrue\t45.5
chr1\t300\t900\t/data/calls/S2.txt\t3\t20\tTRUE\t12
chrX\t10\t50\t/data/calls/S1.txt\t0\t5\tfalse\t3.2
# comment
chr1\t1000\t1200\tS3\t4\t8\ttrue\t99
";

    #[test]
    fn test_read_calls_filtered() {
        let table = read_calls_from_reader(Cursor::new(TABLE), &compact_config(true)).unwrap();
        assert_eq!(table.calls.len(), 3);
        assert_eq!(table.filtered, 1);
        // Filtered rows still contribute chromosomes
        assert_eq!(table.chromosomes, vec!["chr1", "chr2", "chrX"]);

        let first = &table.calls[0];
        assert_eq!(first.chrom(), "chr2");
        assert_eq!(first.start(), 100);
        assert_eq!(first.end(), 200);
        assert_eq!(first.sample, "S1.txt");
        assert_eq!(first.copy_number, 1);
        assert_eq!(first.probe_count, 12);
        assert_eq!(first.confidence, 45.5);
        assert!(first.printable().starts_with("chr2\t100\t200\t/data/calls/S1.txt"));

        assert_eq!(table.calls[2].sample, "S3");
        assert_eq!(table.samples(), vec!["S1.txt", "S2.txt", "S3"]);
    }

    #[test]
    fn test_read_calls_unfiltered() {
        let table = read_calls_from_reader(Cursor::new(TABLE), &compact_config(false)).unwrap();
        assert_eq!(table.calls.len(), 4);
        assert_eq!(table.filtered, 0);
    }

    #[test]
    fn test_read_calls_errors() {
        let short = "chr1\t100\t200\tS1\t1\n";
        let err = read_calls_from_reader(Cursor::new(short), &compact_config(true)).unwrap_err();
        assert!(err.to_string().contains("Malformed call line 1"));

        let bad_start = "chr1\tabc\t200\tS1\t1\t3\ttrue\t1.0\n";
        let err = read_calls_from_reader(Cursor::new(bad_start), &compact_config(true)).unwrap_err();
        assert!(err.to_string().contains("Invalid start at line 1"));

        let inverted = "chr1\t300\t200\tS1\t1\t3\ttrue\t1.0\n";
        assert!(read_calls_from_reader(Cursor::new(inverted), &compact_config(true)).is_err());
    }

    #[test]
    fn test_default_layout() {
        let mut fields = vec!["0"; 61];
        fields[0] = "chr7";
        fields[1] = "5000";
        fields[2] = "9000";
        fields[5] = "/x/y/SAMPLE_A";
        fields[8] = "3";
        fields[35] = "17";
        fields[45] = "true";
        fields[60] = "33.3";
        let line = fields.join("\t");
        let table = read_calls_from_reader(Cursor::new(line), &InputConfig::default()).unwrap();
        assert_eq!(table.calls.len(), 1);
        assert_eq!(table.calls[0].sample, "SAMPLE_A");
        assert_eq!(table.calls[0].probe_count, 17);
    }

    #[test]
    fn test_read_samples() {
        let data = "S2\n\nS1\n# header\nS2\n  S3  \n";
        let samples = read_samples_from_reader(Cursor::new(data)).unwrap();
        assert_eq!(samples, vec!["S1", "S2", "S3"]);
    }
}
