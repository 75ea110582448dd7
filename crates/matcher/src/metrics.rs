// Observation hooks for the lookup engine.
//
// An engine optionally holds one `LookupObserver`; it is called once per
// lookup with the wall-clock latency and how the lookup was resolved. The
// observer is owned by the engine instance, so two engines in one process
// report independently.
use std::time::Duration;

/// How a single lookup was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Empty query, answered without touching cache or index.
    Empty,
    /// Served from the memo cache.
    CacheHit,
    /// Cache miss, bucket scan found a candidate.
    Matched,
    /// Cache miss, bucket scan found nothing.
    NoMatch,
    /// The bucket scan failed.
    Failed,
}

/// Metrics observer for lookups.
pub trait LookupObserver: Send + Sync {
    fn record_lookup(&self, latency: Duration, outcome: LookupOutcome);
}
