//! Batch pipeline: sort, chunk, fan out to a fixed worker pool, collect.
//!
//! ```text
//! records ─sort─▶ producer ─[work queue]─▶ worker × N ─[done queue]─▶ collector
//! ```
//!
//! Both queues are bounded at `buffer_size` chunks, so a slow collector
//! stalls the workers and slow workers stall the producer. Workers borrow
//! the engine through `std::thread::scope`; nothing is cloned per record.
//!
//! Output is a *set* of records unless `preserve_order` is on: chunks reach
//! the collector in completion order, and only order within a chunk is kept.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use index::IndexError;
use matcher::{LookupEngine, MatchResult, MatchType};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// One input row and, once processed, its lookup outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(rename = "lookup_result")]
    pub result: bool,
    pub matched_value: String,
    pub match_type: MatchType,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn apply(&mut self, result: MatchResult) {
        self.result = result.found;
        self.matched_value = result.matched_value;
        self.match_type = result.match_type;
    }
}

/// Totals for one batch run. Only meaningful once the run has returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub processed_records: u64,
    pub matched_records: u64,
    /// Records whose lookup hit a store I/O error and were left unfilled.
    pub failed_records: u64,
    #[serde(with = "millis")]
    pub processing_time: Duration,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Worker pool and queue sizing for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Return records in sorted input order instead of completion order.
    #[serde(default)]
    pub preserve_order: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            preserve_order: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (field, value) in [
            ("worker_count", self.worker_count),
            ("batch_size", self.batch_size),
            ("buffer_size", self.buffer_size),
        ] {
            if value == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{field} must be >= 1"
                )));
            }
        }
        Ok(())
    }
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Cooperative cancellation signal, checked once per chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of a batch run that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub records: Vec<Record>,
    pub metrics: Metrics,
    /// True when the run stopped early; `records` then holds only the
    /// chunks that finished.
    pub cancelled: bool,
}

struct Chunk {
    origin: usize,
    records: Vec<Record>,
}

struct RunState<'a> {
    engine: &'a LookupEngine,
    cancel: &'a CancelFlag,
    processed: AtomicU64,
    matched: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicBool,
    fatal: Mutex<Option<IndexError>>,
}

impl RunState<'_> {
    fn should_stop(&self) -> bool {
        self.aborted.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    fn abort(&self, err: IndexError) {
        let mut slot = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
        self.aborted.store(true, Ordering::Release);
    }

    fn metrics(&self, processing_time: Duration) -> Metrics {
        Metrics {
            processed_records: self.processed.load(Ordering::Relaxed),
            matched_records: self.matched.load(Ordering::Relaxed),
            failed_records: self.failed.load(Ordering::Relaxed),
            processing_time,
        }
    }
}

/// Run every record through `engine` with the given pool sizing.
pub fn process_batch(
    engine: &LookupEngine,
    records: Vec<Record>,
    config: &PipelineConfig,
) -> Result<BatchOutcome, PipelineError> {
    process_batch_with_cancel(engine, records, config, &CancelFlag::new())
}

/// Like [`process_batch`], stopping at the next chunk boundary once
/// `cancel` is set.
///
/// Returns `PipelineError::StoreUnavailable` if any lookup reports that the
/// store is gone; every other lookup error only affects its own record.
pub fn process_batch_with_cancel(
    engine: &LookupEngine,
    mut records: Vec<Record>,
    config: &PipelineConfig,
    cancel: &CancelFlag,
) -> Result<BatchOutcome, PipelineError> {
    config.validate()?;
    let start = Instant::now();
    let submitted = records.len();

    // Stable sort keeps duplicate names in input order.
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let state = RunState {
        engine,
        cancel,
        processed: AtomicU64::new(0),
        matched: AtomicU64::new(0),
        failed: AtomicU64::new(0),
        aborted: AtomicBool::new(false),
        fatal: Mutex::new(None),
    };

    tracing::info!(
        records = submitted,
        workers = config.worker_count,
        batch_size = config.batch_size,
        "starting batch run"
    );

    let (work_tx, work_rx) = bounded::<Chunk>(config.buffer_size);
    let (done_tx, done_rx) = bounded::<Chunk>(config.buffer_size);

    let mut finished: Vec<Chunk> = thread::scope(|scope| {
        for worker_id in 0..config.worker_count {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let state = &state;
            scope.spawn(move || run_worker(worker_id, state, work_rx, done_tx));
        }
        drop(work_rx);
        drop(done_tx);

        let batch_size = config.batch_size;
        let state = &state;
        scope.spawn(move || produce_chunks(records, batch_size, state, work_tx));

        done_rx.iter().collect()
    });

    if let Some(err) = state
        .fatal
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .take()
    {
        tracing::error!(error = %err, "batch run aborted");
        return Err(PipelineError::StoreUnavailable(err));
    }

    if config.preserve_order {
        finished.sort_unstable_by_key(|chunk| chunk.origin);
    }
    let mut output = Vec::with_capacity(submitted);
    for chunk in finished {
        output.extend(chunk.records);
    }

    let metrics = state.metrics(start.elapsed());
    let cancelled = cancel.is_cancelled() && output.len() < submitted;
    tracing::info!(
        processed = metrics.processed_records,
        matched = metrics.matched_records,
        failed = metrics.failed_records,
        elapsed_ms = metrics.processing_time.as_millis() as u64,
        cancelled,
        "batch run complete"
    );

    Ok(BatchOutcome {
        records: output,
        metrics,
        cancelled,
    })
}

fn produce_chunks(
    records: Vec<Record>,
    batch_size: usize,
    state: &RunState<'_>,
    work_tx: Sender<Chunk>,
) {
    let mut rows = records.into_iter();
    let mut origin = 0;
    loop {
        if state.should_stop() {
            break;
        }
        let chunk: Vec<Record> = rows.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        if work_tx
            .send(Chunk {
                origin,
                records: chunk,
            })
            .is_err()
        {
            break;
        }
        origin += 1;
    }
}

fn run_worker(
    worker_id: usize,
    state: &RunState<'_>,
    work_rx: Receiver<Chunk>,
    done_tx: Sender<Chunk>,
) {
    for mut chunk in work_rx.iter() {
        // Drain without work once stopped so the producer never blocks.
        if state.should_stop() {
            continue;
        }
        for record in chunk.records.iter_mut() {
            match state.engine.lookup(&record.name) {
                Ok(result) => {
                    if result.found {
                        state.matched.fetch_add(1, Ordering::Relaxed);
                    }
                    record.apply(result);
                    state.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.is_fatal() => {
                    let matcher::MatchError::Index(index_err) = err;
                    state.abort(index_err);
                    break;
                }
                Err(err) => {
                    tracing::warn!(worker = worker_id, name = %record.name, error = %err, "lookup failed");
                    state.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if state.aborted.load(Ordering::Acquire) {
            continue;
        }
        if done_tx.send(chunk).is_err() {
            break;
        }
    }
    tracing::debug!(worker = worker_id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(values: &[&str]) -> LookupEngine {
        let engine = LookupEngine::in_memory_default().unwrap();
        engine.index().load(values.iter().copied()).unwrap();
        engine
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            worker_count: 3,
            batch_size: 2,
            buffer_size: 1,
            preserve_order: false,
        }
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let engine = engine_with(&[]);
        let cfg = PipelineConfig {
            worker_count: 0,
            ..PipelineConfig::default()
        };
        let err = process_batch(&engine, vec![Record::new("x")], &cfg).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidConfig("worker_count must be >= 1".into())
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let engine = engine_with(&["abc"]);
        let outcome = process_batch(&engine, Vec::new(), &small_config()).unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.metrics.processed_records, 0);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn records_are_filled_in() {
        let engine = engine_with(&["John Smith", "Jane Doe"]);
        let records = vec![
            Record::new("Mr John Smith Jr"),
            Record::new("jane"),
            Record::new("nobody"),
            Record::new(""),
        ];
        let outcome = process_batch(&engine, records, &small_config()).unwrap();

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.metrics.processed_records, 4);
        assert_eq!(outcome.metrics.matched_records, 2);

        let john = outcome
            .records
            .iter()
            .find(|r| r.name == "Mr John Smith Jr")
            .unwrap();
        assert!(john.result);
        assert_eq!(john.matched_value, "john smith");
        assert_eq!(john.match_type, MatchType::ContainsLookup);

        let nobody = outcome.records.iter().find(|r| r.name == "nobody").unwrap();
        assert_eq!(nobody, &Record::new("nobody"));
    }

    #[test]
    fn preserve_order_returns_sorted_input() {
        let engine = engine_with(&["alpha"]);
        let names = ["delta", "alpha one", "charlie", "bravo", "echo", "alpha"];
        let records = names.iter().map(|n| Record::new(*n)).collect();
        let cfg = PipelineConfig {
            preserve_order: true,
            ..small_config()
        };

        let outcome = process_batch(&engine, records, &cfg).unwrap();
        let got: Vec<&str> = outcome.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            got,
            vec!["alpha", "alpha one", "bravo", "charlie", "delta", "echo"]
        );
    }

    #[test]
    fn pre_cancelled_run_returns_nothing() {
        let engine = engine_with(&["abc"]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let records = (0..10).map(|i| Record::new(format!("abc {i}"))).collect();
        let outcome =
            process_batch_with_cancel(&engine, records, &small_config(), &cancel).unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.metrics.processed_records, 0);
    }

    #[test]
    fn metrics_serialize_time_as_millis() {
        let metrics = Metrics {
            processed_records: 3,
            matched_records: 1,
            failed_records: 0,
            processing_time: Duration::from_millis(1500),
        };
        let value = serde_json::to_value(metrics).unwrap();
        assert_eq!(value["processing_time"], 1500);
        assert_eq!(value["processed_records"], 3);
    }

    #[test]
    fn record_serializes_with_file_column_names() {
        let mut record = Record::new("jane");
        record.apply(MatchResult::matched("jane doe", MatchType::LookupContains));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["lookup_result"], true);
        assert_eq!(value["match_type"], "lookup_contains");
    }
}
