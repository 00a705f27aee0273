//! Error types for the merge/cluster/emit pipeline.

use std::fmt;
use std::io;

/// The main error type for merge operations.
///
/// None of these are recoverable: a failure aborts the current copy-type pass.
#[derive(Debug)]
pub enum MergeError {
    /// A relative-position comparison between two intervals matched none of the expected cases
    GeometryInvariantViolation(String),
    /// The density clustering procedure failed or produced output that could not be parsed
    ExternalClusteringFailure {
        /// Island coordinates (`chr:start-end`) for diagnosis
        island: String,
        reason: String,
    },
    /// Writing a track, report or the variant file failed
    OutputWriteFailure(io::Error),
    /// A sample contributed more than one call to a single cluster
    DuplicateSample {
        sample: String,
        locus: String,
    },
    /// Reference sequence lookup failed
    Reference(String),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::GeometryInvariantViolation(msg) => {
                write!(f, "Overlap possibility not found: {}", msg)
            }
            MergeError::ExternalClusteringFailure { island, reason } => {
                write!(f, "Density clustering failed for island {}: {}", island, reason)
            }
            MergeError::OutputWriteFailure(err) => write!(f, "Output write failed: {}", err),
            MergeError::DuplicateSample { sample, locus } => write!(
                f,
                "Sample {} contributes more than one call to merged locus {}",
                sample, locus
            ),
            MergeError::Reference(msg) => write!(f, "Reference lookup failed: {}", msg),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MergeError::OutputWriteFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MergeError {
    fn from(err: io::Error) -> Self {
        MergeError::OutputWriteFailure(err)
    }
}

/// Result type alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
