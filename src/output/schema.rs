//! Run-summary checks: the JSON Schema derived from `MergeSummary` plus the
//! cross-field bookkeeping a schema cannot express.

use std::sync::LazyLock;

use schemars::schema_for;
use serde_json::Value;

use super::types::{MergeSummary, PassSummary};

static SCHEMA: LazyLock<schemars::Schema> = LazyLock::new(|| schema_for!(MergeSummary));

/// Returns the JSON Schema as a pretty-printed JSON string.
pub fn schema_json_pretty() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&*SCHEMA)
}

/// Structural check of a serialized summary against the `MergeSummary` schema.
pub fn validate(value: &Value) -> Result<(), String> {
    let schema_val = serde_json::to_value(&*SCHEMA).map_err(|e| format!("Failed to serialize schema: {}", e))?;
    let validator = jsonschema::validator_for(&schema_val).map_err(|e| format!("Failed to compile schema: {}", e))?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("  - {}: {}", e.instance_path, e))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Summary failed schema validation ({} errors):\n{}", errors.len(), errors.join("\n")))
    }
}

/// Per-chromosome rows of a pass must add up to the pass totals.
fn check_pass(pass: &PassSummary) -> Vec<String> {
    let mut problems = Vec::new();
    let clusters: usize = pass.chromosomes.iter().map(|c| c.clusters).sum();
    let calls: usize = pass.chromosomes.iter().map(|c| c.calls).sum();
    if clusters != pass.merged_loci as usize {
        problems.push(format!(
            "  - {}: {} merged loci but chromosome rows hold {} clusters",
            pass.copy_type, pass.merged_loci, clusters
        ));
    }
    if calls != pass.calls {
        problems.push(format!(
            "  - {}: {} calls but chromosome rows hold {}",
            pass.copy_type, pass.calls, calls
        ));
    }
    for c in &pass.chromosomes {
        if c.clusters < c.islands {
            problems.push(format!(
                "  - {} {}: {} clusters from {} islands",
                pass.copy_type, c.chrom, c.clusters, c.islands
            ));
        }
    }
    problems
}

/// Full check: schema first, then pass bookkeeping.
pub fn validate_summary(summary: &MergeSummary) -> Result<(), String> {
    let value = serde_json::to_value(summary).map_err(|e| format!("Failed to serialize summary: {}", e))?;
    validate(&value)?;

    let problems: Vec<String> = summary.passes.iter().flat_map(check_pass).collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("Summary totals are inconsistent:\n{}", problems.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::types::ChromosomeStats;
    use crate::output::SummaryCollector;

    fn chrom(name: &str, islands: usize, clusters: usize, calls: usize) -> ChromosomeStats {
        ChromosomeStats { chrom: name.to_string(), islands, clusters, calls }
    }

    #[test]
    fn test_schema_generation() {
        let schema = schema_json_pretty().unwrap();
        let parsed: Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(parsed.get("type").and_then(|v| v.as_str()), Some("object"));
    }

    #[test]
    fn test_validate_minimal_output() {
        let output = SummaryCollector::new().build();
        assert!(validate_summary(&output).is_ok());
    }

    #[test]
    fn test_validate_invalid_output() {
        let bad_json: Value = serde_json::json!({"version": 3, "timestamp": "now"});
        assert!(validate(&bad_json).is_err());

        let bad_method: Value = serde_json::json!({
            "version": "0.1.0",
            "timestamp": "now",
            "clustering": {"method": "kmeans", "parameter": 0.5}
        });
        assert!(validate(&bad_method).is_err());
    }

    #[test]
    fn test_pass_totals_must_add_up() {
        let mut summary = SummaryCollector::new().build();
        summary.passes.push(PassSummary {
            copy_type: "DEL".to_string(),
            merged_loci: 3,
            calls: 5,
            duplicate_samples: 0,
            chromosomes: vec![chrom("chr1", 1, 2, 3), chrom("chr2", 1, 1, 2)],
        });
        assert!(validate_summary(&summary).is_ok());

        summary.passes[0].merged_loci = 4;
        summary.passes[0].chromosomes[1].calls = 1;
        let err = validate_summary(&summary).unwrap_err();
        assert!(err.contains("4 merged loci but chromosome rows hold 3 clusters"));
        assert!(err.contains("5 calls but chromosome rows hold 4"));
    }
}
