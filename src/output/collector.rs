//! Builder collecting run results into a `MergeSummary`.

use std::fs::File;

use super::types::{ClusteringSummary, InputSummary, MergeSummary, PassSummary};

/// Builder for the run summary
pub struct SummaryCollector {
    output: MergeSummary,
}

impl SummaryCollector {
    /// Create a new collector with version and timestamp
    pub fn new() -> Self {
        Self {
            output: MergeSummary {
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: crate::utils::time::utc_now_iso8601(),
                ..Default::default()
            },
        }
    }

    pub fn with_clustering(mut self, clustering: ClusteringSummary) -> Self {
        self.output.clustering = Some(clustering);
        self
    }

    pub fn with_input(mut self, input: InputSummary) -> Self {
        self.output.input = Some(input);
        self
    }

    pub fn add_pass(&mut self, pass: PassSummary) {
        self.output.passes.push(pass);
    }

    pub fn add_output(&mut self, path: &str) {
        self.output.outputs.push(path.to_string());
    }

    /// Build and return the final summary
    pub fn build(self) -> MergeSummary {
        self.output
    }

    /// Get a reference to the current summary (for inspection)
    pub fn output(&self) -> &MergeSummary {
        &self.output
    }

    /// Write the summary using the output prefix
    ///
    /// Creates "{prefix}.summary.json"
    pub fn write_to_prefix(&self, prefix: &str) -> std::io::Result<String> {
        let path = format!("{}.summary.json", prefix);
        self.output.write_json(&path)?;
        Ok(path)
    }
}

impl Default for SummaryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true if summaries are checked before being written.
///
/// Always true in debug builds. In release builds, true only if `CNVMERGE_VALIDATE_OUTPUT=1`.
pub fn should_validate() -> bool {
    if cfg!(debug_assertions) {
        true
    } else {
        std::env::var("CNVMERGE_VALIDATE_OUTPUT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

impl MergeSummary {
    /// Write this summary to a JSON file
    pub fn write_json(&self, path: &str) -> std::io::Result<()> {
        if should_validate()
            && let Err(msg) = super::schema::validate_summary(self)
        {
            log::warn!("Summary validation failed for {}: {}", path, msg);
            if cfg!(debug_assertions) {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg));
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(std::io::Error::other)
    }

    /// Load a summary from a JSON file
    pub fn load_json(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        let output: Self = serde_json::from_reader(file)?;
        Ok(output)
    }

    /// Total merge groups over all passes
    pub fn total_loci(&self) -> u32 {
        self.passes.iter().map(|p| p.merged_loci).sum()
    }
}
