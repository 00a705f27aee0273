//! Multi-sample VCF output, one record per merged locus.

use std::collections::BTreeMap;
use std::io::Write;

use log::debug;

use crate::cnv::call::CopyType;
use crate::cnv::interval::GenomicInterval;
use crate::error::MergeResult;
use crate::reference::ReferenceAccessor;
use crate::utils::annotation::{GeneAnnotator, NoAnnotation, PathogenicAnnotator, resolve_pathogenic};
use crate::utils::number::format_trimmed;

/// One sample's contribution to a merged locus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Genotype {
    pub copy_number: i32,
    pub confidence: f64,
}

impl Genotype {
    /// `GT:WC` field and the number of alternate alleles it carries.
    fn render(&self) -> (String, u32) {
        let conf = format_trimmed(self.confidence, 2);
        match self.copy_number {
            1 | 3 => (format!("0/1:{}", conf), 1),
            _ => (format!("1/1:{}", conf), 2),
        }
    }
}

/// Sample id to genotype; sorted so iteration is deterministic.
pub type GenotypeMap = BTreeMap<String, Genotype>;

const MISSING_GENOTYPE: &str = "0/0:.";

const FIXED_HEADER: &str = "\
##ALT=<ID=CNV,Description=\"Copy number variable region\">
##ALT=<ID=CN0,Description=\"Copy number loss\">
##ALT=<ID=DUP,Description=\"Duplication\">
##INFO=<ID=SVLEN,Number=1,Type=Integer,Description=\"Difference in length between REF and ALT alleles; If unknown, will be -1\">
##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position of the variant described in this record\">
##INFO=<ID=AC,Number=1,Type=Integer,Description=\"Allele count for this record\">
##INFO=<ID=GENE,Number=.,Type=String,Description=\"Gene annotation for this variant\">
##INFO=<ID=PATH,Number=.,Type=String,Description=\"Pathogenic annotation for this variant\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=WC,Number=1,Type=Float,Description=\"WES Overlap Confidence by Random Forest\">
";

/// Gene and pathogenic-locus lookups used to fill INFO.
pub struct Annotators {
    pub genes: Box<dyn GeneAnnotator>,
    pub pathogenic: Box<dyn PathogenicAnnotator>,
}

impl Default for Annotators {
    fn default() -> Self {
        Self { genes: Box::new(NoAnnotation), pathogenic: Box::new(NoAnnotation) }
    }
}

/// Header metadata fixed for the whole file.
pub struct VcfHeader<'a> {
    pub source: &'a str,
    pub file_date: String,
    /// Contigs declared in the header, in order
    pub chromosomes: &'a [String],
}

pub struct VariantEmitter<W: Write> {
    writer: W,
    samples: Vec<String>,
    reference: Box<dyn ReferenceAccessor>,
    annotators: Annotators,
    records: usize,
}

impl<W: Write> VariantEmitter<W> {
    /// Create the emitter and write the full header.
    pub fn new(
        writer: W,
        samples: Vec<String>,
        reference: Box<dyn ReferenceAccessor>,
        annotators: Annotators,
        header: &VcfHeader<'_>,
    ) -> MergeResult<Self> {
        let mut emitter = Self { writer, samples, reference, annotators, records: 0 };
        emitter.write_header(header)?;
        Ok(emitter)
    }

    fn write_header(&mut self, header: &VcfHeader<'_>) -> MergeResult<()> {
        writeln!(self.writer, "##fileformat=VCFv4.2")?;
        writeln!(self.writer, "##fileDate={}", header.file_date)?;
        writeln!(self.writer, "##source={}", header.source)?;
        for chrom in header.chromosomes {
            match self.reference.length(chrom) {
                Some(len) => writeln!(self.writer, "##contig=<ID={},length={}>", chrom, len)?,
                None => {
                    debug!("No reference length for contig {}", chrom);
                    writeln!(self.writer, "##contig=<ID={}>", chrom)?
                }
            }
        }
        self.writer.write_all(FIXED_HEADER.as_bytes())?;
        write!(self.writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
        for sample in &self.samples {
            write!(self.writer, "\t{}", sample)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Write one record for a merged locus and flush. Returns the record's allele count.
    pub fn add_record(
        &mut self,
        interval: &GenomicInterval,
        genotypes: &GenotypeMap,
        copy_type: CopyType,
    ) -> MergeResult<u32> {
        let mut ac = 0;
        let mut fields = Vec::with_capacity(self.samples.len());
        for sample in &self.samples {
            match genotypes.get(sample) {
                Some(gt) => {
                    let (field, alleles) = gt.render();
                    ac += alleles;
                    fields.push(field);
                }
                None => fields.push(MISSING_GENOTYPE.to_string()),
            }
        }
        let unlisted = genotypes.keys().filter(|s| !self.samples.contains(*s)).count();
        if unlisted > 0 {
            debug!("{} genotypes at {} belong to samples outside the VCF", unlisted, interval);
        }

        let (chrom, start, end) = (interval.chrom.as_str(), interval.start, interval.end);
        let ref_base = self.reference.base(chrom, start)?;
        let genes = self.annotators.genes.overlapping_genes(chrom, start, end);
        let hits = self.annotators.pathogenic.overlapping_loci(chrom, start, end, &genes, copy_type)?;
        let gene_field = if genes.is_empty() { ".".to_string() } else { genes.join("|") };
        let path_field = resolve_pathogenic(&hits).unwrap_or_else(|| ".".to_string());

        writeln!(
            self.writer,
            "{}\t{}\t.\t{}\t{}\t.\t.\tEND={};SVLEN={};AC={};GENE={};PATH={}\tGT:WC\t{}",
            chrom,
            start + 1,
            ref_base,
            copy_type.alt_allele(),
            end,
            interval.length(),
            ac,
            gene_field,
            path_field,
            fields.join("\t")
        )?;
        self.writer.flush()?;
        self.records += 1;
        Ok(ac)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
