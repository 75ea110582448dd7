//! # Reference Prefix Index
//!
//! This crate provides a durable, ordered index of normalized reference
//! strings. Every value is stored under a composite key made of a short
//! prefix, a separator and the value itself, so all values sharing a prefix
//! sit next to each other and can be range-scanned as one *prefix bucket*.
//!
//! ## Core Features
//!
//! - **Pluggable Backends**: Storage goes through the [`IndexBackend`] trait.
//!   Out of the box it provides:
//!   - An in-memory `BTreeMap` backend for tests and ephemeral runs.
//!   - A Redb backend for persistent, on-disk storage (`backend-redb` feature).
//! - **Idempotent Loads**: The key is the value itself, so loading the same
//!   reference file twice leaves the bucket membership unchanged.
//! - **Ordered Scans**: [`PrefixIndex::scan_prefix`] yields values in
//!   ascending byte order of their composite key. Because every key in a
//!   bucket shares the same `prefix:` head, this is ascending byte order of
//!   the value. Callers that stop at the first acceptable candidate depend on
//!   this order.
//!
//! ## Scalability Limit
//!
//! A scan touches the whole bucket for its prefix. A skewed reference set
//! (many values starting with the same three characters) makes a miss cost
//! O(bucket size). [`PrefixIndex::scan_candidates`] visits up to three
//! buckets per query character, so a miss on a long query pays that many
//! seeks.
//!
//! ## Example Usage
//!
//! ```
//! use index::{BackendConfig, IndexConfig, PrefixIndex};
//!
//! let index = PrefixIndex::new(IndexConfig::new().with_backend(BackendConfig::in_memory())).unwrap();
//! index.load(["John Smith", "  jane doe  ", ""]).unwrap();
//!
//! assert_eq!(index.prefix_values("joh").unwrap(), vec!["john smith".to_string()]);
//! assert_eq!(index.len().unwrap(), 2);
//! ```

mod backend;

use std::cell::Cell;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{BackendConfig, InMemoryBackend, IndexBackend, KeyVisitor};

/// Number of leading characters of a normalized value used as its bucket.
pub const PREFIX_LEN: usize = 3;

/// Separator between the prefix and the value in a composite key.
pub const KEY_SEPARATOR: char = ':';

/// Presence marker stored as the value of every key.
pub const PRESENCE_MARKER: &[u8] = &[1];

/// Default number of keys committed per load transaction.
pub const DEFAULT_LOAD_BATCH_SIZE: usize = 50_000;

/// Lowercase and trim a raw string.
///
/// This is the single normalization applied both to reference values before
/// storage and to queries before lookup.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Bucket prefix of an already-normalized value: its first
/// `min(PREFIX_LEN, chars)` characters.
///
/// Counting characters rather than bytes keeps the prefix on a UTF-8
/// boundary.
pub fn prefix_of(normalized: &str) -> &str {
    match normalized.char_indices().nth(PREFIX_LEN) {
        Some((end, _)) => &normalized[..end],
        None => normalized,
    }
}

/// Recover the value from a composite key.
///
/// Values may themselves contain the separator, so the split is the one
/// whose head is exactly the prefix of the tail.
fn split_key(key: &str) -> Option<&str> {
    key.char_indices()
        .take(PREFIX_LEN + 1)
        .filter(|&(_, c)| c == KEY_SEPARATOR)
        .map(|(at, _)| (&key[..at], &key[at + KEY_SEPARATOR.len_utf8()..]))
        .find(|(head, value)| prefix_of(value) == *head)
        .map(|(_, value)| value)
}

/// One normalized reference value together with its bucket prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub normalized_value: String,
    pub prefix_key: String,
}

impl ReferenceEntry {
    /// Normalize a raw line. Empty or whitespace-only input yields `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let normalized_value = normalize(raw);
        if normalized_value.is_empty() {
            return None;
        }
        let prefix_key = prefix_of(&normalized_value).to_string();
        Some(Self {
            normalized_value,
            prefix_key,
        })
    }

    /// Composite storage key: `prefix:value`.
    pub fn storage_key(&self) -> String {
        let mut key =
            String::with_capacity(self.prefix_key.len() + 1 + self.normalized_value.len());
        key.push_str(&self.prefix_key);
        key.push(KEY_SEPARATOR);
        key.push_str(&self.normalized_value);
        key
    }
}

/// Config for initializing the index.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// Backend storage configuration (in-memory or Redb).
    pub backend: BackendConfig,
    /// Maximum number of keys written per atomic load transaction.
    pub load_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            load_batch_size: DEFAULT_LOAD_BATCH_SIZE,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_load_batch_size(mut self, load_batch_size: usize) -> Self {
        self.load_batch_size = load_batch_size.max(1);
        self
    }
}

/// Index error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The store could not be opened or is no longer reachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// A read or write against an open store failed.
    #[error("store I/O error: {0}")]
    Io(String),
    /// The reference source could not be read.
    #[error("reference source error: {0}")]
    Source(String),
}

impl IndexError {
    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        Self::StoreUnavailable(err.to_string())
    }

    pub fn io<E: std::fmt::Display>(err: E) -> Self {
        Self::Io(err.to_string())
    }

    /// Whether this error means the whole store is gone rather than a single
    /// operation failing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexError::StoreUnavailable(_))
    }
}

/// Observable counters for a reference load. Both only ever increase.
#[derive(Debug, Default)]
pub struct LoadProgress {
    lines_read: AtomicU64,
    values_written: AtomicU64,
}

impl LoadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lines consumed from the source, including skipped blank lines.
    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    /// Keys committed to the store (duplicates count once per occurrence).
    pub fn values_written(&self) -> u64 {
        self.values_written.load(Ordering::Relaxed)
    }
}

/// Summary of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub lines_read: u64,
    pub values_written: u64,
    pub batches: u64,
}

/// Prefix-partitioned reference index.
///
/// Append-only while loading, read-only while matching. Safe to share
/// across threads; scans never block each other.
pub struct PrefixIndex {
    /// The backend used for storage, abstracted behind a trait.
    backend: Box<dyn IndexBackend>,
    /// The configuration for the index.
    cfg: IndexConfig,
    progress: Arc<LoadProgress>,
}

impl PrefixIndex {
    /// Initialize or open an index using the configured backend.
    pub fn new(cfg: IndexConfig) -> Result<Self, IndexError> {
        let backend = cfg.backend.build()?;
        Ok(Self::with_backend(cfg, backend))
    }

    /// Build an index with a custom backend (e.g., a fault-injecting one in tests).
    pub fn with_backend(cfg: IndexConfig, backend: Box<dyn IndexBackend>) -> Self {
        Self {
            backend,
            cfg,
            progress: Arc::new(LoadProgress::new()),
        }
    }

    /// Count loads into a caller-owned handle instead of a private one, so
    /// the caller can poll progress before the index is handed back.
    pub fn with_progress(mut self, progress: Arc<LoadProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    /// Shared handle to the load counters, usable from another thread while
    /// a load is running.
    pub fn progress(&self) -> Arc<LoadProgress> {
        Arc::clone(&self.progress)
    }

    /// Normalize and store every value, skipping blank ones.
    ///
    /// Values are committed in transactions of at most
    /// `load_batch_size` keys; each transaction is atomic. Re-loading a value
    /// that is already present overwrites the same key.
    pub fn load<I, S>(&self, values: I) -> Result<LoadSummary, IndexError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.load_lines(values.into_iter().map(Ok))
    }

    /// Stream a newline-delimited reference file into the index.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<LoadSummary, IndexError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| IndexError::Source(format!("{}: {e}", path.display())))?;
        let reader = BufReader::new(file);
        tracing::info!(path = %path.display(), "loading reference values");
        self.load_lines(
            reader
                .lines()
                .map(|line| line.map_err(|e| IndexError::Source(e.to_string()))),
        )
    }

    fn load_lines<I, S>(&self, lines: I) -> Result<LoadSummary, IndexError>
    where
        I: Iterator<Item = Result<S, IndexError>>,
        S: AsRef<str>,
    {
        let batch_size = self.cfg.load_batch_size.max(1);
        let mut pending: Vec<(String, Vec<u8>)> = Vec::with_capacity(batch_size.min(4096));
        let mut summary = LoadSummary {
            lines_read: 0,
            values_written: 0,
            batches: 0,
        };

        for line in lines {
            let line = line?;
            summary.lines_read += 1;
            self.progress.lines_read.fetch_add(1, Ordering::Relaxed);

            if let Some(entry) = ReferenceEntry::from_raw(line.as_ref()) {
                pending.push((entry.storage_key(), PRESENCE_MARKER.to_vec()));
            }
            if pending.len() >= batch_size {
                self.commit_batch(&mut pending, &mut summary)?;
            }
        }
        if !pending.is_empty() {
            self.commit_batch(&mut pending, &mut summary)?;
        }
        self.backend.flush()?;

        tracing::info!(
            lines_read = summary.lines_read,
            values_written = summary.values_written,
            batches = summary.batches,
            "reference load complete"
        );
        Ok(summary)
    }

    fn commit_batch(
        &self,
        pending: &mut Vec<(String, Vec<u8>)>,
        summary: &mut LoadSummary,
    ) -> Result<(), IndexError> {
        self.backend.batch_put(pending)?;
        let written = pending.len() as u64;
        summary.values_written += written;
        summary.batches += 1;
        self.progress
            .values_written
            .fetch_add(written, Ordering::Relaxed);
        tracing::info!(
            batch = summary.batches,
            keys = written,
            total = summary.values_written,
            "committed reference batch"
        );
        pending.clear();
        Ok(())
    }

    /// Visit every stored value in the bucket `prefix`, in key order.
    ///
    /// The visitor receives the bare value (composite key minus
    /// `prefix:`). Returning `ControlFlow::Break(())` ends the scan.
    pub fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str) -> Result<ControlFlow<()>, IndexError>,
    ) -> Result<(), IndexError> {
        let mut head = String::with_capacity(prefix.len() + 1);
        head.push_str(prefix);
        head.push(KEY_SEPARATOR);

        self.backend.scan_prefix(&head, &mut |key: &str| {
            let value = &key[head.len()..];
            // "ab:" also heads keys of the "ab:" bucket, e.g. "ab::ab:x".
            if prefix_of(value) != prefix {
                return Ok(ControlFlow::Continue(()));
            }
            visitor(value)
        })
    }

    /// Visit every stored value that is a match candidate for an
    /// already-normalized query.
    ///
    /// The query's own bucket comes first, in key order. A query shorter
    /// than `PREFIX_LEN` characters owns every bucket whose prefix begins
    /// with it: `"a"` covers `"a"`, `"ab"`, `"abc"` and so on.
    ///
    /// After that, each character position of the query is a possible start
    /// of a stored value contained in it, so the buckets named by the one to
    /// `PREFIX_LEN` characters at each position are scanned in position
    /// order. Buckets are visited at most once. A value that contains the
    /// query but lives in another bucket is never reached.
    pub fn scan_candidates(
        &self,
        query: &str,
        visitor: &mut dyn FnMut(&str) -> Result<ControlFlow<()>, IndexError>,
    ) -> Result<(), IndexError> {
        let own = prefix_of(query);
        if own.is_empty() {
            return Ok(());
        }
        let short = own.chars().count() < PREFIX_LEN;

        let stopped = Cell::new(false);
        let mut guarded = |value: &str| -> Result<ControlFlow<()>, IndexError> {
            let flow = visitor(value)?;
            if flow.is_break() {
                stopped.set(true);
            }
            Ok(flow)
        };

        if short {
            self.backend
                .scan_prefix(own, &mut |key: &str| match split_key(key) {
                    Some(value) => guarded(value),
                    None => Ok(ControlFlow::Continue(())),
                })?;
        } else {
            self.scan_prefix(own, &mut guarded)?;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(own);
        for (start, _) in query.char_indices() {
            if stopped.get() {
                break;
            }
            let tail = &query[start..];
            let ends = tail
                .char_indices()
                .map(|(at, c)| at + c.len_utf8())
                .take(PREFIX_LEN);
            for end in ends {
                let bucket = &tail[..end];
                if (short && bucket.starts_with(own)) || !seen.insert(bucket) {
                    continue;
                }
                self.scan_prefix(bucket, &mut guarded)?;
                if stopped.get() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Collect a whole bucket. Intended for tests and diagnostics.
    pub fn prefix_values(&self, prefix: &str) -> Result<Vec<String>, IndexError> {
        let mut values = Vec::new();
        self.scan_prefix(prefix, &mut |value| {
            values.push(value.to_string());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(values)
    }

    /// Whether an exact (raw, normalized on the way in) value was loaded.
    pub fn contains(&self, raw: &str) -> Result<bool, IndexError> {
        match ReferenceEntry::from_raw(raw) {
            Some(entry) => self.backend.contains(&entry.storage_key()),
            None => Ok(false),
        }
    }

    /// Number of distinct stored values.
    pub fn len(&self) -> Result<u64, IndexError> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn memory_index() -> PrefixIndex {
        PrefixIndex::new(IndexConfig::new().with_backend(BackendConfig::in_memory()))
            .expect("in-memory index")
    }

    #[test]
    fn prefix_is_char_aware() {
        assert_eq!(prefix_of("john smith"), "joh");
        assert_eq!(prefix_of("ab"), "ab");
        assert_eq!(prefix_of("é"), "é");
        assert_eq!(prefix_of("éüöx"), "éüö");
        assert_eq!(prefix_of(""), "");
    }

    #[test]
    fn entry_normalizes_and_skips_blank() {
        let entry = ReferenceEntry::from_raw("  ACME Corp ").unwrap();
        assert_eq!(entry.normalized_value, "acme corp");
        assert_eq!(entry.prefix_key, "acm");
        assert_eq!(entry.storage_key(), "acm:acme corp");

        assert!(ReferenceEntry::from_raw("").is_none());
        assert!(ReferenceEntry::from_raw(" \t ").is_none());
    }

    #[test]
    fn load_collapses_duplicates() {
        let index = memory_index();
        let summary = index
            .load(["Jane Doe", "jane doe", "  JANE DOE", "", "john smith"])
            .unwrap();

        assert_eq!(summary.lines_read, 5);
        assert_eq!(summary.values_written, 4);
        assert_eq!(index.len().unwrap(), 2);
        assert_eq!(index.prefix_values("jan").unwrap(), vec!["jane doe"]);
    }

    #[test]
    fn load_twice_keeps_membership() {
        let index = memory_index();
        let values = ["abc", "abcd", "abx", "zeta"];
        index.load(values).unwrap();
        let first: BTreeSet<String> = index.prefix_values("abc").unwrap().into_iter().collect();

        index.load(values).unwrap();
        let second: BTreeSet<String> = index.prefix_values("abc").unwrap().into_iter().collect();

        assert_eq!(first, second);
        assert_eq!(index.len().unwrap(), 4);
    }

    #[test]
    fn scan_returns_values_in_key_order() {
        let index = memory_index();
        index.load(["smithson", "smith", "smit"]).unwrap();
        assert_eq!(
            index.prefix_values("smi").unwrap(),
            vec!["smit", "smith", "smithson"]
        );
    }

    #[test]
    fn short_prefix_does_not_see_longer_buckets() {
        let index = memory_index();
        index.load(["ab", "abc"]).unwrap();
        // "ab" lives in bucket "ab", "abc" in bucket "abc".
        assert_eq!(index.prefix_values("ab").unwrap(), vec!["ab"]);
        assert_eq!(index.prefix_values("abc").unwrap(), vec!["abc"]);
    }

    #[test]
    fn short_query_spans_longer_buckets() {
        let index = memory_index();
        index.load(["ab", "abc corp", "b", "a"]).unwrap();

        let mut seen = Vec::new();
        index
            .scan_candidates("a", &mut |value| {
                seen.push(value.to_string());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "ab", "abc corp"]);

        seen.clear();
        index
            .scan_candidates("abcd", &mut |value| {
                seen.push(value.to_string());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(seen, vec!["abc corp", "a", "ab", "b"]);
    }

    #[test]
    fn candidates_include_values_starting_inside_query() {
        let index = memory_index();
        index
            .load(["John Smith", "Jane Doe", "big john smith", "mr"])
            .unwrap();

        let mut seen = Vec::new();
        index
            .scan_candidates("mr john smith jr", &mut |value| {
                seen.push(value.to_string());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(seen, vec!["mr", "john smith"]);

        seen.clear();
        index
            .scan_candidates("mr john smith jr", &mut |value| {
                seen.push(value.to_string());
                Ok(ControlFlow::Break(()))
            })
            .unwrap();
        assert_eq!(seen, vec!["mr"]);
    }

    #[test]
    fn scan_prefix_skips_neighbouring_separator_bucket() {
        let index = memory_index();
        index.load(["ab", "ab:x"]).unwrap();
        assert_eq!(index.prefix_values("ab").unwrap(), vec!["ab".to_string()]);
        assert_eq!(index.prefix_values("ab:").unwrap(), vec!["ab:x".to_string()]);
    }

    #[test]
    fn split_key_handles_separator_in_value() {
        assert_eq!(split_key("a:b:a:b"), Some("a:b"));
        assert_eq!(split_key("ab:ab"), Some("ab"));
        assert_eq!(split_key("joh:john smith"), Some("john smith"));
        assert_eq!(split_key("é:é"), Some("é"));
        assert_eq!(split_key("garbage"), None);
    }

    #[test]
    fn small_batches_commit_separately() {
        let index = PrefixIndex::new(
            IndexConfig::new()
                .with_backend(BackendConfig::in_memory())
                .with_load_batch_size(2),
        )
        .unwrap();
        let summary = index.load(["a1", "a2", "a3", "a4", "a5"]).unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(index.progress().values_written(), 5);
        assert_eq!(index.progress().lines_read(), 5);
    }

    #[test]
    fn shared_progress_handle_sees_the_load() {
        let progress = Arc::new(LoadProgress::new());
        let index = memory_index().with_progress(Arc::clone(&progress));
        index.load(["alpha", "", "beta"]).unwrap();

        assert_eq!(progress.lines_read(), 3);
        assert_eq!(progress.values_written(), 2);
        assert!(Arc::ptr_eq(&progress, &index.progress()));
    }

    #[test]
    fn contains_normalizes_its_argument() {
        let index = memory_index();
        index.load(["Globex"]).unwrap();
        assert!(index.contains("  GLOBEX ").unwrap());
        assert!(!index.contains("globe").unwrap());
        assert!(!index.contains("   ").unwrap());
    }
}
