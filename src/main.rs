//! Batch CLI: load a reference list, match every row of a CSV file against
//! it and replace the file with the results.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError};
use refmatch::{
    build_engine_with_progress, run_job, BackendKind, JobSpec, LoadProgress, RefmatchConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refmatch")]
#[command(about = "Match CSV records against a reference list", long_about = None)]
struct Cli {
    /// Input CSV file; replaced with the processed output
    #[arg(long)]
    input: PathBuf,

    /// Reference file (one value per line)
    #[arg(long)]
    lookup: PathBuf,

    /// Index database path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Number of workers
    #[arg(long)]
    workers: Option<usize>,

    /// Records per batch
    #[arg(long)]
    batch: Option<usize>,

    /// Bounded queue capacity, in batches
    #[arg(long)]
    buffer: Option<usize>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Candidate name columns, first present one wins
    #[arg(long, value_delimiter = ',', default_value = "name")]
    columns: Vec<String>,
}

impl Cli {
    fn resolve_config(&self) -> Result<RefmatchConfig> {
        let mut config = match &self.config {
            Some(path) => RefmatchConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RefmatchConfig::default(),
        };

        if let Some(db) = &self.db {
            config.index.backend = BackendKind::Redb;
            config.index.path = db.to_string_lossy().into_owned();
        }
        if let Some(workers) = self.workers {
            config.pipeline.worker_count = workers;
        }
        if let Some(batch) = self.batch {
            config.pipeline.batch_size = batch;
        }
        if let Some(buffer) = self.buffer {
            config.pipeline.buffer_size = buffer;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let progress = Arc::new(LoadProgress::new());
    let (done_tx, done_rx) = bounded::<()>(0);
    let engine = thread::scope(|scope| {
        let reporter = Arc::clone(&progress);
        scope.spawn(move || loop {
            match done_rx.recv_timeout(Duration::from_secs(1)) {
                Err(RecvTimeoutError::Timeout) => tracing::info!(
                    lines_read = reporter.lines_read(),
                    values_written = reporter.values_written(),
                    "loading reference values"
                ),
                _ => break,
            }
        });

        let built = build_engine_with_progress(
            config.index.to_index_config(),
            config.cache,
            &cli.lookup,
            Arc::clone(&progress),
        );
        drop(done_tx);
        built
    })
    .context("building lookup engine")?;

    let spec = JobSpec::new(cli.input.clone())
        .with_search_columns(cli.columns.clone())
        .with_pipeline(config.pipeline);
    let report = run_job(&engine, &spec)
        .with_context(|| format!("processing {}", cli.input.display()))?;

    println!("Processing completed:");
    println!("Total records processed: {}", report.metrics.processed_records);
    println!("Matched records: {}", report.metrics.matched_records);
    println!("Failed records: {}", report.metrics.failed_records);
    println!("Processing time: {:?}", report.metrics.processing_time);
    println!("Cache hits: {}", report.cache_stats.hits);
    println!("Cache misses: {}", report.cache_stats.misses);

    Ok(())
}
