//! Minimal BED reader for gene regions.

use std::fs::File;
use std::io::{BufRead, BufReader};

#[derive(Debug, Clone, PartialEq)]
pub struct BedRegion {
    pub chrom: String,
    pub start: u32,
    pub end: u32,
    pub name: String,
}

/// UCSC header lines that may precede BED rows.
fn is_header(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("track") || line.starts_with("browser")
}

pub fn read_bed(bed_path: &str) -> Result<Vec<BedRegion>, Box<dyn std::error::Error>> {
    let file = File::open(bed_path)
        .map_err(|e| std::io::Error::other(format!("Error opening BED file {}: {}", bed_path, e)))?;
    read_bed_from_reader(BufReader::new(file))
}

pub fn read_bed_from_reader<R: BufRead>(reader: R) -> Result<Vec<BedRegion>, Box<dyn std::error::Error>> {
    let mut regions = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || is_header(&line) {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            return Err(format!("Malformed BED line {} (expected at least 3 columns, got {}): {}", i + 1, parts.len(), line).into());
        }

        let chrom = parts[0].to_string();
        let start: u32 = parts[1].parse().map_err(|e| format!("Invalid start at line {}: {}", i + 1, e))?;
        let end: u32 = parts[2].parse().map_err(|e| format!("Invalid end at line {}: {}", i + 1, e))?;
        if start >= end {
            return Err(format!("Empty BED interval at line {}: {}-{}", i + 1, start, end).into());
        }
        let name = match parts.get(3) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("{}:{}-{}", chrom, start, end),
        };

        regions.push(BedRegion { chrom, start, end, name });
    }
    Ok(regions)
}
