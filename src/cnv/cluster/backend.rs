//! Density-based clustering backends.
//!
//! The protocol is the same for every backend: a distance matrix keyed by call
//! identifiers goes in, one `(callId, clusterId)` pair per call comes out, and
//! cluster id 0 marks noise.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;

use crate::cnv::similarity::SimilarityMatrix;
use crate::config::CommandConfig;

/// Cluster label reserved for noise (unclustered) calls.
pub const NOISE: usize = 0;

/// One call's cluster label as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub cluster: usize,
}

pub trait DensityBackend {
    /// Assign every row of `matrix` (named by `ids`) to a cluster, `NOISE` for outliers.
    fn assign(&self, matrix: &SimilarityMatrix, ids: &[String], epsilon: f64) -> Result<Vec<Assignment>>;

    fn name(&self) -> &'static str;
}

/// Parse a tab-delimited two-column `(callId, clusterId)` table.
///
/// Blank lines are skipped, as is a header line (first line whose second column is not
/// an integer). Values may be double-quoted; ids may contain spaces.
pub fn parse_assignments<R: BufRead>(reader: R) -> Result<Vec<Assignment>> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 2 {
            bail!("Malformed clustering result line {} (expected 2 tab-separated columns): {}", i + 1, line);
        }
        let id = fields[0].trim_matches('"');
        let cluster_field = fields[1].trim().trim_matches('"');
        match cluster_field.parse::<usize>() {
            Ok(cluster) => out.push(Assignment { id: id.to_string(), cluster }),
            Err(_) if i == 0 => continue,
            Err(e) => bail!("Invalid cluster id at line {}: {} ({})", i + 1, cluster_field, e),
        }
    }
    Ok(out)
}

// ============================================================================
// External command
// ============================================================================

/// Runs an external program (an R script by default) as
/// `<program> <args..> <matrix file> <results file> <epsilon>`.
///
/// Both files live in a temporary directory removed once results are parsed.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    tmp_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandBackend {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self { program: program.to_string(), args, tmp_dir: None, timeout: None }
    }

    pub fn from_config(config: &CommandConfig, timeout_secs: u64) -> Self {
        let mut backend = Self::new(&config.program, config.args.clone());
        backend.tmp_dir = config.tmp_dir.as_ref().map(PathBuf::from);
        if timeout_secs > 0 {
            backend.timeout = Some(Duration::from_secs(timeout_secs));
        }
        backend
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn run(&self, matrix_path: &Path, results_path: &Path, stderr_path: &Path, epsilon: f64) -> Result<()> {
        let stderr_file = File::create(stderr_path)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(matrix_path)
            .arg(results_path)
            .arg(epsilon.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.program))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = self.timeout
                && started.elapsed() > limit
            {
                let _ = child.kill();
                let _ = child.wait();
                bail!("{} did not finish within {:?}", self.program, limit);
            }
            std::thread::sleep(Duration::from_millis(20));
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(stderr_path).unwrap_or_default();
            bail!("{} exited with {}: {}", self.program, status, stderr.trim());
        }
        Ok(())
    }
}

impl DensityBackend for CommandBackend {
    fn assign(&self, matrix: &SimilarityMatrix, ids: &[String], epsilon: f64) -> Result<Vec<Assignment>> {
        let dir = match &self.tmp_dir {
            Some(d) => tempfile::Builder::new().prefix("cnvmerge").tempdir_in(d)?,
            None => tempfile::Builder::new().prefix("cnvmerge").tempdir()?,
        };
        let matrix_path = dir.path().join("DBSCANClust.mat");
        let results_path = dir.path().join("DBSCANClust.results.txt");
        let stderr_path = dir.path().join("DBSCANClust.stderr.txt");

        {
            let mut w = BufWriter::new(File::create(&matrix_path)?);
            matrix.write_tsv(ids, &mut w)?;
            w.flush()?;
        }
        debug!("Running {} on {} calls (eps={})", self.program, ids.len(), epsilon);
        self.run(&matrix_path, &results_path, &stderr_path, epsilon)?;

        let file = File::open(&results_path)
            .with_context(|| format!("{} produced no results file", self.program))?;
        let assignments = parse_assignments(BufReader::new(file))?;
        dir.close()?;
        Ok(assignments)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

// ============================================================================
// In-process DBSCAN
// ============================================================================

/// DBSCAN over the precomputed distance matrix.
///
/// Two calls are neighbours when the distance is within `epsilon` in both directions;
/// a call is a core point when its neighbourhood (itself included) holds at least
/// `min_points` calls.
#[derive(Debug, Clone)]
pub struct NativeDbscan {
    min_points: usize,
}

impl NativeDbscan {
    pub fn new(min_points: usize) -> Self {
        Self { min_points: min_points.max(1) }
    }

    fn neighbours(matrix: &SimilarityMatrix, i: usize, epsilon: f64) -> Vec<usize> {
        (0..matrix.len())
            .filter(|&j| matrix.get(i, j).max(matrix.get(j, i)) <= epsilon)
            .collect()
    }
}

impl DensityBackend for NativeDbscan {
    fn assign(&self, matrix: &SimilarityMatrix, ids: &[String], epsilon: f64) -> Result<Vec<Assignment>> {
        if !matrix.is_distance() {
            return Err(anyhow!("DBSCAN requires a distance matrix"));
        }
        let n = matrix.len();
        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut next_cluster = 1;

        for p in 0..n {
            if labels[p].is_some() {
                continue;
            }
            let seeds = Self::neighbours(matrix, p, epsilon);
            if seeds.len() < self.min_points {
                labels[p] = Some(NOISE);
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[p] = Some(cluster);

            let mut queue: Vec<usize> = seeds;
            while let Some(q) = queue.pop() {
                match labels[q] {
                    Some(NOISE) => labels[q] = Some(cluster),
                    Some(_) => continue,
                    None => {
                        labels[q] = Some(cluster);
                        let reach = Self::neighbours(matrix, q, epsilon);
                        if reach.len() >= self.min_points {
                            queue.extend(reach.into_iter().filter(|&r| labels[r].is_none() || labels[r] == Some(NOISE)));
                        }
                    }
                }
            }
        }

        Ok(ids
            .iter()
            .zip(labels)
            .map(|(id, label)| Assignment { id: id.clone(), cluster: label.unwrap_or(NOISE) })
            .collect())
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
