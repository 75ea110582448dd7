use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use index::{normalize, BackendConfig, IndexConfig, PrefixIndex};

use crate::cache::{CachePolicy, LookupCache};
use crate::loose::FoldedQuery;
use crate::metrics::{LookupObserver, LookupOutcome};
use crate::types::{CacheStats, Lookup, MatchError, MatchResult, MatchType};


/// Index + matcher + memo cache behind one `lookup` call.
///
/// One engine is built at startup and shared by reference (or `Arc`) with
/// every worker and request handler.
pub struct LookupEngine {
    index: Arc<PrefixIndex>,
    cache: LookupCache,
    hits: AtomicU64,
    misses: AtomicU64,
    observer: Option<Arc<dyn LookupObserver>>,
}

impl LookupEngine {
    /// Construct an engine that owns `index`, with an unbounded cache.
    pub fn new(index: PrefixIndex) -> Self {
        Self::with_index_arc(Arc::new(index), CachePolicy::Unbounded)
    }

    /// Construct an engine from a shared index handle and an explicit cache policy.
    pub fn with_index_arc(index: Arc<PrefixIndex>, policy: CachePolicy) -> Self {
        Self {
            index,
            cache: LookupCache::new(policy),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            observer: None,
        }
    }

    /// Convenience helper to build an in-memory engine for tests or ephemeral matching.
    pub fn in_memory_default() -> Result<Self, MatchError> {
        let cfg = IndexConfig::new().with_backend(BackendConfig::in_memory());
        let index = PrefixIndex::new(cfg)?;
        Ok(Self::new(index))
    }

    /// Install an observer that is told about every lookup.
    pub fn with_observer(mut self, observer: Arc<dyn LookupObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn index(&self) -> &PrefixIndex {
        &self.index
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Look up a query and return only the match result.
    pub fn lookup(&self, query: &str) -> Result<MatchResult, MatchError> {
        self.lookup_detailed(query).map(|lookup| lookup.result)
    }

    /// Look up a query, also reporting whether the cache answered it.
    ///
    /// 1. The query is normalized (lowercase, trim). An empty query is a
    ///    miss that never touches the cache or the index.
    /// 2. A cached positive result is returned as-is.
    /// 3. Otherwise the query's candidate buckets are scanned in key order
    ///    and the first candidate that loosely contains, or is contained by,
    ///    the query wins. Only that positive result is cached.
    pub fn lookup_detailed(&self, query: &str) -> Result<Lookup, MatchError> {
        let start = Instant::now();
        let query = normalize(query);
        if query.is_empty() {
            self.observe(start, LookupOutcome::Empty);
            return Ok(Lookup {
                result: MatchResult::not_found(),
                cache_hit: false,
            });
        }

        if let Some(result) = self.cache.get(&query) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.observe(start, LookupOutcome::CacheHit);
            return Ok(Lookup {
                result,
                cache_hit: true,
            });
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = match self.scan_bucket(&query) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(query = %query, error = %err, "bucket scan failed");
                self.observe(start, LookupOutcome::Failed);
                return Err(err);
            }
        };

        if result.found {
            self.cache.put(&query, &result);
            self.observe(start, LookupOutcome::Matched);
        } else {
            self.observe(start, LookupOutcome::NoMatch);
        }

        Ok(Lookup {
            result,
            cache_hit: false,
        })
    }

    fn scan_bucket(&self, query: &str) -> Result<MatchResult, MatchError> {
        let folded = FoldedQuery::new(query);
        let mut found: Option<(String, MatchType)> = None;

        self.index.scan_candidates(query, &mut |candidate: &str| {
            let match_type = folded.match_candidate(candidate);
            if match_type.is_match() {
                found = Some((candidate.to_string(), match_type));
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;

        Ok(match found {
            Some((value, match_type)) => MatchResult::matched(value, match_type),
            None => MatchResult::not_found(),
        })
    }

    fn observe(&self, start: Instant, outcome: LookupOutcome) {
        if let Some(observer) = &self.observer {
            observer.record_lookup(start.elapsed(), outcome);
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Counters are independent; a snapshot taken while lookups are running
    /// may mix values from slightly different instants.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.cache_hits(),
            misses: self.cache_misses(),
            entries: self.cache.len() as u64,
        }
    }
}
