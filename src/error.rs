use std::path::PathBuf;

use crate::ingest::driver::IngestReport;

/// No date strategy produced a string in the canonical format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no parseable date for sub-message {index} (tried: {})", .tried.join(", "))]
pub struct DateResolutionError {
    pub index: usize,
    /// `strategy=candidate` for each candidate that failed to parse.
    pub tried: Vec<String>,
}

/// The message source broke down mid-run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("message source lost: {0}")]
    Lost(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Everything kept before the failure is in `partial`, already sorted.
    #[error("ingestion aborted after {} kept record(s): {source}", .partial.records.len())]
    SourceLost {
        partial: IngestReport,
        #[source]
        source: SourceError,
    },
}
