use std::path::PathBuf;

use index::IndexError;
use thiserror::Error;

/// Errors that stop a whole batch run.
///
/// Per-record lookup failures are not errors at this level; they leave the
/// record at its zero value and show up in `Metrics::failed_records`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    /// The index store became unreachable mid-run.
    #[error("store unavailable during batch run: {0}")]
    StoreUnavailable(IndexError),
}

/// Errors reading or writing record files.
#[derive(Debug, Error)]
pub enum RecordFileError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Header lacks every search column, or a row could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("failed to write records: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to write records: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from an end-to-end batch job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Records(#[from] RecordFileError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("batch run was cancelled before completion")]
    Cancelled,
}

impl JobError {
    /// Whether the failure came from the caller's input rather than the service.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, JobError::Records(RecordFileError::MalformedInput(_)))
    }
}
