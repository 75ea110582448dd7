use std::path::{Path, PathBuf};
use std::sync::Arc;

use index::{IndexConfig, LoadProgress, PrefixIndex};
use matcher::{CachePolicy, CacheStats, LookupEngine};
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::pipeline::{process_batch_with_cancel, CancelFlag, Metrics, PipelineConfig};
use crate::records::{read_records, write_records};

/// Open the index, load the reference file into it and wrap it in an engine.
///
/// Fails with `IndexError::StoreUnavailable` when the store cannot be
/// opened and `IndexError::Source` when the reference file is unreadable.
pub fn build_engine(
    index_cfg: IndexConfig,
    cache: CachePolicy,
    lookup_file: &Path,
) -> Result<LookupEngine, JobError> {
    build_engine_with_progress(index_cfg, cache, lookup_file, Arc::new(LoadProgress::new()))
}

/// Like [`build_engine`], counting the load into `progress` so another
/// thread can report it while the reference file streams in.
pub fn build_engine_with_progress(
    index_cfg: IndexConfig,
    cache: CachePolicy,
    lookup_file: &Path,
    progress: Arc<LoadProgress>,
) -> Result<LookupEngine, JobError> {
    let index = PrefixIndex::new(index_cfg)?.with_progress(progress);
    let summary = index.load_file(lookup_file)?;
    tracing::info!(
        lookup_file = %lookup_file.display(),
        values = summary.values_written,
        "reference index ready"
    );
    Ok(LookupEngine::with_index_arc(Arc::new(index), cache))
}

/// One file-processing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub input_path: PathBuf,
    /// Candidate name columns, first match wins. Empty means `name`.
    #[serde(default)]
    pub search_columns: Vec<String>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl JobSpec {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            search_columns: Vec::new(),
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn with_search_columns(mut self, columns: Vec<String>) -> Self {
        self.search_columns = columns;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub metrics: Metrics,
    pub processed_path: PathBuf,
    pub cache_stats: CacheStats,
}

/// Read the input file, run it through the pipeline and replace it with the
/// processed records.
pub fn run_job(engine: &LookupEngine, spec: &JobSpec) -> Result<JobReport, JobError> {
    run_job_with_cancel(engine, spec, &CancelFlag::new())
}

/// Like [`run_job`]. A cancelled run writes nothing and returns
/// [`JobError::Cancelled`], leaving the input file as it was.
pub fn run_job_with_cancel(
    engine: &LookupEngine,
    spec: &JobSpec,
    cancel: &CancelFlag,
) -> Result<JobReport, JobError> {
    let records = read_records(&spec.input_path, &spec.search_columns)?;
    let outcome = process_batch_with_cancel(engine, records, &spec.pipeline, cancel)?;
    if outcome.cancelled {
        return Err(JobError::Cancelled);
    }

    write_records(&spec.input_path, &outcome.records)?;
    tracing::info!(path = %spec.input_path.display(), "processed file written");

    Ok(JobReport {
        metrics: outcome.metrics,
        processed_path: spec.input_path.clone(),
        cache_stats: engine.cache_stats(),
    })
}
