//! One copy-type merge pass: islands → clusters → merge groups → outputs.

use std::io::Write;

use log::{debug, info, warn};

use crate::cnv::call::{CnvCall, CopyType};
use crate::cnv::cluster::Clusterer;
use crate::cnv::interval::GenomicInterval;
use crate::cnv::island::group_islands;
use crate::config::DuplicatePolicy;
use crate::error::{MergeError, MergeResult};
use crate::output::tracks::{TrackWriter, write_report_line};
use crate::output::types::{ChromosomeStats, PassSummary};
use crate::output::vcf::{Genotype, GenotypeMap, VariantEmitter};

/// Where one pass writes. Track sinks are per pass; report and VCF are shared by both passes.
pub struct PassSinks<'s, W: Write> {
    pub merged_bed: &'s mut dyn Write,
    pub raw_bed: &'s mut dyn Write,
    pub report: &'s mut dyn Write,
    pub emitter: &'s mut VariantEmitter<W>,
}

/// State that lives exactly as long as one pass.
struct PassState {
    copy_type: CopyType,
    next_group: u32,
    duplicates: usize,
}

impl PassState {
    fn new(copy_type: CopyType) -> Self {
        Self { copy_type, next_group: 1, duplicates: 0 }
    }

    fn allocate_group(&mut self) -> u32 {
        let id = self.next_group;
        self.next_group += 1;
        id
    }

    fn allocated(&self) -> u32 {
        self.next_group - 1
    }
}

pub struct MergeOrchestrator<'c> {
    clusterer: &'c dyn Clusterer,
    duplicate_policy: DuplicatePolicy,
}

impl<'c> MergeOrchestrator<'c> {
    pub fn new(clusterer: &'c dyn Clusterer, duplicate_policy: DuplicatePolicy) -> Self {
        Self { clusterer, duplicate_policy }
    }

    /// Add one call to a locus' genotype map, applying the duplicate-sample policy.
    fn record_genotype(
        &self,
        genotypes: &mut GenotypeMap,
        call: &CnvCall,
        locus: &GenomicInterval,
        state: &mut PassState,
    ) -> MergeResult<()> {
        let genotype = Genotype { copy_number: call.copy_number, confidence: call.confidence };
        if !genotypes.contains_key(&call.sample) {
            genotypes.insert(call.sample.clone(), genotype);
            return Ok(());
        }

        state.duplicates += 1;
        match self.duplicate_policy {
            DuplicatePolicy::Error => {
                return Err(MergeError::DuplicateSample { sample: call.sample.clone(), locus: locus.to_string() });
            }
            DuplicatePolicy::KeepLast => {
                warn!("Sample {} has several calls in {}; keeping the last", call.sample, locus);
                genotypes.insert(call.sample.clone(), genotype);
            }
            DuplicatePolicy::KeepFirst => {
                warn!("Sample {} has several calls in {}; keeping the first", call.sample, locus);
            }
        }
        Ok(())
    }

    /// Merge every call of `copy_type`, tagging each with its merge group.
    ///
    /// Merge-group ids run from 1 within this pass, across chromosomes in karyotype order.
    pub fn merge_pass<W: Write>(
        &self,
        calls: &mut [CnvCall],
        copy_type: CopyType,
        sinks: PassSinks<'_, W>,
    ) -> MergeResult<PassSummary> {
        let PassSinks { merged_bed, raw_bed, report, emitter } = sinks;
        let mut tracks = TrackWriter::new(merged_bed, raw_bed, copy_type, self.clusterer.parameter())?;
        let mut state = PassState::new(copy_type);
        let islands = group_islands(calls, copy_type);
        info!("{} pass: {} islands", copy_type, islands.len());

        let mut summary = PassSummary { copy_type: copy_type.to_string(), ..Default::default() };

        for chrom in islands.chromosomes() {
            let mut stats = ChromosomeStats { chrom: chrom.to_string(), ..Default::default() };

            for (envelope, members) in islands.islands(chrom) {
                let clusters = {
                    let island: Vec<&CnvCall> = members.iter().map(|&i| &calls[i]).collect();
                    self.clusterer.cluster(&island)?
                };
                debug!("{}: {} calls in {} clusters", envelope, members.len(), clusters.len());
                stats.islands += 1;

                for cluster in clusters.values() {
                    let group = state.allocate_group();
                    let locus = &cluster.interval;
                    tracks.write_merged(group, locus)?;

                    let mut genotypes = GenotypeMap::new();
                    for &pos in &cluster.members {
                        let call = &mut calls[members[pos]];
                        call.attach_merge_group(group);
                        tracks.write_raw(group, call)?;
                        write_report_line(&mut *report, call, locus)?;
                        self.record_genotype(&mut genotypes, call, locus, &mut state)?;
                        stats.calls += 1;
                    }
                    report.flush()?;
                    emitter.add_record(locus, &genotypes, state.copy_type)?;
                    stats.clusters += 1;
                }
                tracks.flush()?;
            }

            info!(
                "{} {}: {} islands, {} merged loci, {} calls merged",
                copy_type, chrom, stats.islands, stats.clusters, stats.calls
            );
            summary.calls += stats.calls;
            summary.chromosomes.push(stats);
        }

        summary.merged_loci = state.allocated();
        summary.duplicate_samples = state.duplicates;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnv::cluster::{ClusterMap, DensityClustering, NativeDbscan, ReciprocalClustering};
    use crate::output::vcf::{Annotators, VcfHeader};
    use crate::reference::InMemoryReference;

    fn call(chrom: &str, start: u32, end: u32, cn: i32, sample: &str) -> CnvCall {
        CnvCall::new(chrom, start, end, cn, 10, 50.0, sample)
    }

    fn emitter(samples: &[&str]) -> VariantEmitter<Vec<u8>> {
        let seq = "A".repeat(1000);
        let reference = InMemoryReference::new().with_contig("chr1", &seq).with_contig("chr2", &seq);
        let chroms = vec!["chr1".to_string(), "chr2".to_string()];
        let header = VcfHeader { source: "test", file_date: "20240101".to_string(), chromosomes: &chroms };
        VariantEmitter::new(
            Vec::new(),
            samples.iter().map(|s| s.to_string()).collect(),
            Box::new(reference),
            Annotators::default(),
            &header,
        )
        .unwrap()
    }

    struct Buffers {
        merged: Vec<u8>,
        raw: Vec<u8>,
        report: Vec<u8>,
    }

    impl Buffers {
        fn new() -> Self {
            Self { merged: Vec::new(), raw: Vec::new(), report: Vec::new() }
        }

        fn sinks<'s>(&'s mut self, emitter: &'s mut VariantEmitter<Vec<u8>>) -> PassSinks<'s, Vec<u8>> {
            PassSinks { merged_bed: &mut self.merged, raw_bed: &mut self.raw, report: &mut self.report, emitter }
        }
    }

    fn test_calls() -> Vec<CnvCall> {
        vec![
            // chr2 DEL island, two reciprocal calls
            call("chr2", 100, 200, 1, "S1"),
            call("chr2", 110, 210, 0, "S2"),
            // chr1 DEL: two separate events in one island
            call("chr1", 100, 200, 1, "S1"),
            call("chr1", 190, 600, 1, "S2"),
            // DUPs
            call("chr1", 300, 400, 3, "S3"),
            call("chr2", 500, 600, 4, "S1"),
        ]
    }

    #[test]
    fn test_merge_groups_restart_per_pass() {
        let mut calls = test_calls();
        let clusterer = ReciprocalClustering::new(0.5);
        let orchestrator = MergeOrchestrator::new(&clusterer, DuplicatePolicy::KeepLast);
        let mut vcf = emitter(&["S1", "S2", "S3"]);

        let mut del_out = Buffers::new();
        let del = orchestrator.merge_pass(&mut calls, CopyType::Del, del_out.sinks(&mut vcf)).unwrap();
        let mut dup_out = Buffers::new();
        let dup = orchestrator.merge_pass(&mut calls, CopyType::Dup, dup_out.sinks(&mut vcf)).unwrap();

        assert_eq!(del.merged_loci, 3);
        assert_eq!(del.calls, 4);
        assert_eq!(dup.merged_loci, 2);
        assert_eq!(dup.calls, 2);

        // chr1 first, then chr2; ids strictly increasing from 1
        assert_eq!(calls[2].merge_group(), Some(1));
        assert_eq!(calls[3].merge_group(), Some(2));
        assert_eq!(calls[0].merge_group(), Some(3));
        assert_eq!(calls[1].merge_group(), Some(3));
        // DUP pass starts again at 1
        assert_eq!(calls[4].merge_group(), Some(1));
        assert_eq!(calls[5].merge_group(), Some(2));

        let chroms: Vec<&str> = del.chromosomes.iter().map(|c| c.chrom.as_str()).collect();
        assert_eq!(chroms, vec!["chr1", "chr2"]);
        assert_eq!(del.chromosomes[0].islands, 1);
        assert_eq!(del.chromosomes[0].clusters, 2);

        let merged = String::from_utf8(del_out.merged).unwrap();
        let rows: Vec<&str> = merged.lines().collect();
        assert!(rows[0].starts_with("track name=MergedDEL-0.5 "));
        assert_eq!(rows[1], "chr1\t100\t200\tDEL_1\t1000\t+\t100\t200\t255,127,0");
        assert_eq!(rows[3], "chr2\t100\t210\tDEL_3\t1000\t+\t100\t210\t0,255,0");

        let raw = String::from_utf8(del_out.raw).unwrap();
        assert!(raw.contains("chr2\t110\t210\tDEL_3-S2\t"));

        let report = String::from_utf8(del_out.report).unwrap();
        assert_eq!(report.lines().count(), 4);
        assert!(report.lines().all(|l| l.contains("\tchr")));

        let vcf_text = String::from_utf8(vcf.into_inner()).unwrap();
        let records: Vec<&str> = vcf_text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(records.len(), 5);
        // chr2 DEL locus: S1 het, S2 hom, S3 absent
        assert!(records[2].starts_with("chr2\t101\t.\tA\t<CN0>\t.\t.\tEND=210;SVLEN=110;AC=3;"));
        assert!(records[2].ends_with("\tGT:WC\t0/1:50\t1/1:50\t0/0:."));
        assert!(records[3].contains("\t<DUP>\t"));
    }

    #[test]
    fn test_union_contains_attached_calls() {
        let mut calls = vec![
            call("chr1", 100, 300, 1, "A"),
            call("chr1", 120, 320, 1, "B"),
            call("chr1", 150, 330, 1, "C"),
            call("chr1", 700, 800, 1, "D"),
        ];
        let clusterer = DensityClustering::new(0.5, Box::new(NativeDbscan::new(2)));
        let orchestrator = MergeOrchestrator::new(&clusterer, DuplicatePolicy::KeepLast);
        let mut vcf = emitter(&["A", "B", "C", "D"]);
        let mut out = Buffers::new();
        let summary = orchestrator.merge_pass(&mut calls, CopyType::Del, out.sinks(&mut vcf)).unwrap();
        assert_eq!(summary.merged_loci, 2);

        let merged = String::from_utf8(out.merged).unwrap();
        let loci: Vec<GenomicInterval> = merged
            .lines()
            .skip(1)
            .map(|l| {
                let f: Vec<&str> = l.split('\t').collect();
                GenomicInterval::new(f[0], f[1].parse().unwrap(), f[2].parse().unwrap())
            })
            .collect();
        for c in &calls {
            let group = c.merge_group().unwrap() as usize;
            assert!(loci[group - 1].contains(&c.interval));
        }
        assert!(merged.contains("track name=MergedDEL-0.5 "));
    }

    /// Clusters every island into a single locus, regardless of overlap.
    struct OneCluster;

    impl Clusterer for OneCluster {
        fn cluster(&self, island: &[&CnvCall]) -> MergeResult<ClusterMap> {
            let mut map = ClusterMap::new();
            let mut it = island.iter().enumerate();
            if let Some((pos, first)) = it.next() {
                let mut c = crate::cnv::cluster::Cluster::singleton(pos, first);
                for (pos, call) in it {
                    c.absorb(pos, call);
                }
                map.insert(1, c);
            }
            Ok(map)
        }

        fn kind(&self) -> crate::cnv::cluster::ClusterKind {
            crate::cnv::cluster::ClusterKind::Reciprocal
        }

        fn parameter(&self) -> f64 {
            1.0
        }
    }

    fn duplicate_calls() -> Vec<CnvCall> {
        vec![
            CnvCall::new("chr1", 100, 200, 1, 10, 10.0, "S1"),
            CnvCall::new("chr1", 150, 260, 0, 10, 20.0, "S1"),
        ]
    }

    fn run_duplicates(policy: DuplicatePolicy) -> (MergeResult<PassSummary>, String) {
        let mut calls = duplicate_calls();
        let orchestrator = MergeOrchestrator::new(&OneCluster, policy);
        let mut vcf = emitter(&["S1"]);
        let mut out = Buffers::new();
        let result = orchestrator.merge_pass(&mut calls, CopyType::Del, out.sinks(&mut vcf));
        (result, String::from_utf8(vcf.into_inner()).unwrap())
    }

    #[test]
    fn test_duplicate_sample_policies() {
        let (last, vcf) = run_duplicates(DuplicatePolicy::KeepLast);
        assert_eq!(last.unwrap().duplicate_samples, 1);
        assert!(vcf.lines().last().unwrap().ends_with("\t1/1:20"));

        let (first, vcf) = run_duplicates(DuplicatePolicy::KeepFirst);
        assert_eq!(first.unwrap().duplicate_samples, 1);
        assert!(vcf.lines().last().unwrap().ends_with("\t0/1:10"));

        let (err, _) = run_duplicates(DuplicatePolicy::Error);
        match err {
            Err(MergeError::DuplicateSample { sample, locus }) => {
                assert_eq!(sample, "S1");
                assert_eq!(locus, "chr1:100-260");
            }
            other => panic!("expected duplicate-sample error, got {:?}", other.map(|s| s.merged_loci)),
        }
    }

    #[test]
    fn test_empty_pass() {
        let mut calls = vec![call("chr1", 100, 200, 3, "S1")];
        let clusterer = ReciprocalClustering::new(0.5);
        let orchestrator = MergeOrchestrator::new(&clusterer, DuplicatePolicy::KeepLast);
        let mut vcf = emitter(&["S1"]);
        let mut out = Buffers::new();
        let summary = orchestrator.merge_pass(&mut calls, CopyType::Del, out.sinks(&mut vcf)).unwrap();
        assert_eq!(summary.merged_loci, 0);
        assert!(summary.chromosomes.is_empty());
        assert_eq!(calls[0].merge_group(), None);
        assert_eq!(String::from_utf8(out.merged).unwrap().lines().count(), 1);
    }
}
