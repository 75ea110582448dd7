//! Workspace umbrella crate for refmatch.
//!
//! Ties the prefix index (`index`) and lookup engine (`matcher`) to a batch
//! pipeline that fills in CSV record files, so callers can go from a
//! reference list and an input file to a processed file with one call.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use index::{BackendConfig, IndexConfig};
//! use matcher::CachePolicy;
//! use refmatch::{build_engine, run_job, JobSpec};
//!
//! let engine = build_engine(
//!     IndexConfig::new().with_backend(BackendConfig::redb("lookup.redb")),
//!     CachePolicy::Unbounded,
//!     Path::new("lookup.txt"),
//! )?;
//! let report = run_job(&engine, &JobSpec::new("people.csv"))?;
//! println!("{} of {} matched", report.metrics.matched_records, report.metrics.processed_records);
//! # Ok::<(), refmatch::JobError>(())
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod records;

pub use config::{BackendKind, ConfigLoadError, IndexYamlConfig, RefmatchConfig};
pub use error::{JobError, PipelineError, RecordFileError};
pub use job::{
    build_engine, build_engine_with_progress, run_job, run_job_with_cancel, JobReport, JobSpec,
};
pub use pipeline::{
    process_batch, process_batch_with_cancel, BatchOutcome, CancelFlag, Metrics, PipelineConfig,
    Record,
};
pub use records::{read_records, write_records, OUTPUT_HEADER};

pub use index::{IndexError, LoadProgress, PrefixIndex};
pub use matcher::{CachePolicy, CacheStats, LookupEngine, MatchResult, MatchType};
