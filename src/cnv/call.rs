//! Per-sample CNV observations.

use std::fmt;

use super::interval::GenomicInterval;

/// Copy-number class a call (and a merge pass) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CopyType {
    Del,
    Dup,
}

impl CopyType {
    /// Deletions are any copy number below the diploid 2.
    pub fn from_copy_number(copy_number: i32) -> Self {
        if copy_number < 2 {
            CopyType::Del
        } else {
            CopyType::Dup
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CopyType::Del => "DEL",
            CopyType::Dup => "DUP",
        }
    }

    /// Symbolic ALT allele used in the variant file
    pub fn alt_allele(&self) -> &'static str {
        match self {
            CopyType::Del => "<CN0>",
            CopyType::Dup => "<DUP>",
        }
    }
}

impl fmt::Display for CopyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sample's CNV call.
///
/// Everything except `merge_group` is fixed at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct CnvCall {
    pub interval: GenomicInterval,
    pub copy_number: i32,
    pub probe_count: u32,
    pub confidence: f64,
    pub sample: String,
    /// The input record this call was parsed from, echoed in the per-individual report
    pub record: Option<String>,
    merge_group: Option<u32>,
}

impl CnvCall {
    pub fn new(
        chrom: &str,
        start: u32,
        end: u32,
        copy_number: i32,
        probe_count: u32,
        confidence: f64,
        sample: &str,
    ) -> Self {
        Self {
            interval: GenomicInterval::new(chrom, start, end),
            copy_number,
            probe_count,
            confidence,
            sample: sample.to_string(),
            record: None,
            merge_group: None,
        }
    }

    pub fn with_record(mut self, record: String) -> Self {
        self.record = Some(record);
        self
    }

    pub fn chrom(&self) -> &str {
        &self.interval.chrom
    }

    pub fn start(&self) -> u32 {
        self.interval.start
    }

    pub fn end(&self) -> u32 {
        self.interval.end
    }

    pub fn length(&self) -> u32 {
        self.interval.length()
    }

    pub fn copy_type(&self) -> CopyType {
        CopyType::from_copy_number(self.copy_number)
    }

    pub fn attach_merge_group(&mut self, merge_group: u32) {
        self.merge_group = Some(merge_group);
    }

    pub fn merge_group(&self) -> Option<u32> {
        self.merge_group
    }

    /// Stable identifier used as row/column key when handing matrices to a clustering backend.
    pub fn identifier(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.sample,
            self.chrom(),
            self.start(),
            self.end(),
            self.copy_number
        )
    }

    /// Report line: the original record if available, else the parsed fields.
    pub fn printable(&self) -> String {
        match &self.record {
            Some(r) => r.clone(),
            None => format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                self.chrom(),
                self.start(),
                self.end(),
                self.sample,
                self.copy_number,
                self.probe_count,
                self.confidence
            ),
        }
    }
}
