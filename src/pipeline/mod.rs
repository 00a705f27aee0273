pub mod orchestrator;

use std::fs::File;
use std::io::{BufWriter, Write};

use log::info;

use crate::cnv::call::CopyType;
use crate::cnv::cluster::{ClusterKind, build_clusterer};
use crate::config::MergeConfig;
use crate::input::{read_calls, read_samples};
use crate::output::types::{ClusteringSummary, InputSummary, MergeSummary};
use crate::output::vcf::{Annotators, VariantEmitter, VcfHeader};
use crate::output::SummaryCollector;
use crate::reference::{ReferenceAccessor, open_fasta};
use crate::utils::annotation::{GeneIndex, PathogenicIndex};
use crate::utils::time::utc_today_yyyymmdd;

pub use orchestrator::{MergeOrchestrator, PassSinks};

pub const COPY_TYPES: [CopyType; 2] = [CopyType::Del, CopyType::Dup];

/// Suffixes (appended to the output prefix) of every file a run writes.
pub fn output_suffixes(kind: ClusterKind) -> Vec<String> {
    let mut suffixes = Vec::new();
    for ct in COPY_TYPES {
        suffixes.push(format!(".{}.{}.merged.bed", ct, kind));
        suffixes.push(format!(".{}.{}.raw_cnv.bed", ct, kind));
    }
    suffixes.push(".qcdMerged.txt".to_string());
    suffixes.push(format!(".{}.vcf", kind));
    suffixes.push(".summary.json".to_string());
    suffixes
}

fn create(path: &str) -> std::io::Result<BufWriter<File>> {
    File::create(path).map(BufWriter::new).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Error creating output file {}: {}", path, e))
    })
}

pub struct MergeRunner<'a> {
    calls_path: String,
    out_prefix: String,
    fasta_path: Option<String>,
    reference: Option<Box<dyn ReferenceAccessor>>,
    genes_path: Option<String>,
    pathogenic_path: Option<String>,
    samples_path: Option<String>,
    config: Option<&'a MergeConfig>,
}

impl<'a> MergeRunner<'a> {
    pub fn new(calls_path: &str, out_prefix: &str) -> Self {
        Self {
            calls_path: calls_path.to_string(),
            out_prefix: out_prefix.to_string(),
            fasta_path: None,
            reference: None,
            genes_path: None,
            pathogenic_path: None,
            samples_path: None,
            config: None,
        }
    }

    /// Indexed FASTA supplying REF bases and contig lengths.
    pub fn with_fasta(mut self, fasta_path: &str) -> Self {
        self.fasta_path = Some(fasta_path.to_string());
        self
    }

    /// Use an already opened reference instead of a FASTA path.
    pub fn with_reference(mut self, reference: Box<dyn ReferenceAccessor>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_genes(mut self, bed_path: Option<&str>) -> Self {
        self.genes_path = bed_path.map(|s| s.to_string());
        self
    }

    pub fn with_pathogenic(mut self, table_path: Option<&str>) -> Self {
        self.pathogenic_path = table_path.map(|s| s.to_string());
        self
    }

    pub fn with_samples(mut self, samples_path: Option<&str>) -> Self {
        self.samples_path = samples_path.map(|s| s.to_string());
        self
    }

    pub fn with_config(mut self, config: &'a MergeConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn load_annotators(&self) -> Result<Annotators, Box<dyn std::error::Error>> {
        let mut annotators = Annotators::default();
        if let Some(path) = &self.genes_path {
            annotators.genes = Box::new(GeneIndex::load(path)?);
        }
        if let Some(path) = &self.pathogenic_path {
            annotators.pathogenic = Box::new(PathogenicIndex::load(path)?);
        }
        Ok(annotators)
    }

    /// Run the DEL and DUP passes and write every output under the prefix.
    pub fn run(mut self) -> Result<MergeSummary, Box<dyn std::error::Error>> {
        info!("Starting merge...");
        let default_config = MergeConfig::default();
        let config = self.config.unwrap_or(&default_config);

        let mut table = read_calls(&self.calls_path, &config.input)?;
        let samples = match &self.samples_path {
            Some(path) => read_samples(path)?,
            None => table.samples(),
        };
        info!("{} samples in the variant file", samples.len());

        let reference = match (self.reference.take(), &self.fasta_path) {
            (Some(reference), _) => reference,
            (None, Some(path)) => open_fasta(path)?,
            (None, None) => return Err("A reference FASTA is required".into()),
        };
        let annotators = self.load_annotators()?;

        let clusterer = build_clusterer(&config.clustering);
        let kind = clusterer.kind();
        info!("Clustering with {} (parameter {})", kind, clusterer.parameter());

        let mut collector = SummaryCollector::new()
            .with_clustering(ClusteringSummary {
                method: kind,
                parameter: clusterer.parameter(),
                backend: match kind {
                    ClusterKind::Dbscan => Some(config.clustering.backend.as_str().to_string()),
                    ClusterKind::Reciprocal => None,
                },
            })
            .with_input(InputSummary {
                calls: table.calls.len(),
                filtered: table.filtered,
                samples: samples.len(),
                chromosomes: table.chromosomes.clone(),
            });

        let prefix = &self.out_prefix;
        let vcf_path = format!("{}.{}.vcf", prefix, kind);
        let report_path = format!("{}.qcdMerged.txt", prefix);

        let header = VcfHeader {
            source: &config.output.source,
            file_date: utc_today_yyyymmdd(),
            chromosomes: &table.chromosomes,
        };
        let mut emitter = VariantEmitter::new(create(&vcf_path)?, samples, reference, annotators, &header)?;
        let mut report = create(&report_path)?;

        let orchestrator = MergeOrchestrator::new(clusterer.as_ref(), config.clustering.duplicate_sample);
        for copy_type in COPY_TYPES {
            let merged_path = format!("{}.{}.{}.merged.bed", prefix, copy_type, kind);
            let raw_path = format!("{}.{}.{}.raw_cnv.bed", prefix, copy_type, kind);
            let mut merged = create(&merged_path)?;
            let mut raw = create(&raw_path)?;

            let pass = orchestrator.merge_pass(
                &mut table.calls,
                copy_type,
                PassSinks { merged_bed: &mut merged, raw_bed: &mut raw, report: &mut report, emitter: &mut emitter },
            )?;
            merged.flush()?;
            raw.flush()?;
            info!("{} pass: {} merged loci from {} calls", copy_type, pass.merged_loci, pass.calls);

            collector.add_pass(pass);
            collector.add_output(&merged_path);
            collector.add_output(&raw_path);
        }
        report.flush()?;
        emitter.into_inner().flush()?;
        collector.add_output(&report_path);
        collector.add_output(&vcf_path);

        collector.add_output(&format!("{}.summary.json", prefix));
        let summary_path = collector.write_to_prefix(prefix)?;
        info!("Summary written to {}", summary_path);

        Ok(collector.build())
    }
}
