use std::path::Path;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, error};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use cnvmerge::cnv::cluster::ClusterKind;
use cnvmerge::config::MergeConfig;
use cnvmerge::output::schema::schema_json_pretty;
use cnvmerge::pipeline::{MergeRunner, output_suffixes};

#[derive(Parser)]
#[command(name = "cnvmerge")]
#[command(
    about = "Merge per-sample CNV calls into cohort loci",
    long_about = "Groups overlapping per-sample CNV calls into islands, clusters each island into merged loci, and writes BED tracks, a per-individual report and a multi-sample VCF."
)]
struct Cli {
    /// Log verbosity level
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,
    /// Write log output to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,
    /// Append to log file instead of truncating
    #[arg(long, global = true)]
    append_log: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Merge deletion and duplication calls across samples
    Merge {
        /// Tab-delimited processed-call table, one call per line
        #[arg(long, required = true)]
        calls: String,
        /// Reference genome FASTA file. Must be indexed (i.e., a corresponding .fai file must exist).
        #[arg(long, required = true)]
        fasta: String,
        /// Prefix for output files (e.g., "results/cohort"). Outputs are named `<prefix>.<CT>.<METHOD>.merged.bed`, `<prefix>.<METHOD>.vcf`, etc.
        #[arg(long, required = true)]
        out_prefix: String,
        /// BED file of gene regions (chrom, start, end, name) used for the GENE annotation
        #[arg(long)]
        genes: Option<String>,
        /// Pathogenic locus table used for the PATH annotation
        #[arg(long)]
        pathogenic: Option<String>,
        /// Sample ids for the VCF columns, one per line. Defaults to every sample in the call table.
        #[arg(long)]
        samples: Option<String>,
        /// Path to configuration JSON file (clustering, input columns, output metadata)
        #[arg(long)]
        config: Option<String>,
        /// Clustering method, overriding the configuration
        #[arg(long)]
        method: Option<ClusterKind>,
        /// DBSCAN epsilon, overriding the configuration
        #[arg(long)]
        epsilon: Option<f64>,
        /// Overwrite existing output files
        #[arg(long)]
        force: bool,
    },
    /// Print the JSON Schema of the run summary
    Schema {
        /// Write the schema to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

fn check_output_paths(
    prefix: &str,
    suffixes: &[String],
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(prefix);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }

    if !force {
        for suffix in suffixes {
            let p = format!("{}{}", prefix, suffix);
            if Path::new(&p).exists() {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "Output file {} already exists. Use --force to overwrite.",
                        p
                    ),
                )));
            }
        }
    }

    Ok(())
}

struct StepTimer {
    total_start: std::time::Instant,
    step_start: std::time::Instant,
}

impl StepTimer {
    fn new() -> Self {
        let now = std::time::Instant::now();
        Self {
            total_start: now,
            step_start: now,
        }
    }
    fn start(&mut self, name: &str) {
        info!("===== [STAGE] {} =====", name);
        self.step_start = std::time::Instant::now();
    }
    fn end(&self) {
        let now = std::time::Instant::now();
        info!("----- Stage Time: {:.2?} -----", now.duration_since(self.step_start));
        info!("----- Total Time: {:.2?} -----", now.duration_since(self.total_start));
    }
}

fn fail(msg: String) -> ! {
    error!("{}", msg);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let mut log_builder = env_logger::Builder::from_default_env();
    log_builder
        .filter_level(cli.log_level.to_level_filter())
        .format_module_path(false);
    if let Some(ref path) = cli.log_file {
        let file = if cli.append_log {
            std::fs::File::options().create(true).append(true).open(path)
        } else {
            std::fs::File::create(path)
        }
        .unwrap_or_else(|e| panic!("Could not open log file '{}': {}", path, e));
        log_builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    log_builder.init();

    match &cli.command {
        Commands::Merge {
            calls,
            fasta,
            out_prefix,
            genes,
            pathogenic,
            samples,
            config,
            method,
            epsilon,
            force,
        } => {
            let mut timer = StepTimer::new();

            timer.start("Initialization");
            let mut merge_config = match config {
                Some(path) => match MergeConfig::load(path) {
                    Ok(c) => c,
                    Err(e) => fail(format!("Error loading config {}: {}", path, e)),
                },
                None => MergeConfig::default(),
            };
            if let Some(m) = method {
                merge_config.clustering.method = *m;
            }
            if let Some(eps) = epsilon {
                merge_config.clustering.epsilon = *eps;
            }

            let suffixes = output_suffixes(merge_config.clustering.method);
            if let Err(e) = check_output_paths(out_prefix, &suffixes, *force) {
                fail(e.to_string());
            }
            timer.end();

            timer.start("Merge");
            let summary = match MergeRunner::new(calls, out_prefix)
                .with_fasta(fasta)
                .with_genes(genes.as_deref())
                .with_pathogenic(pathogenic.as_deref())
                .with_samples(samples.as_deref())
                .with_config(&merge_config)
                .run()
            {
                Ok(s) => s,
                Err(e) => fail(format!("Merge failed: {}", e)),
            };
            timer.end();

            info!(
                "Merged {} loci over {} passes; outputs written with prefix {}",
                summary.total_loci(),
                summary.passes.len(),
                out_prefix
            );
        }
        Commands::Schema { output } => {
            let schema = match schema_json_pretty() {
                Ok(s) => s,
                Err(e) => fail(format!("Error generating schema: {}", e)),
            };
            match output {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, schema) {
                        fail(format!("Error writing schema to {}: {}", path, e));
                    }
                    info!("Schema written to {}", path);
                }
                None => println!("{}", schema),
            }
        }
    }
}
