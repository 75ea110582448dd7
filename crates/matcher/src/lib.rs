//! # Reference Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` sits on top of the prefix index (`index`). It answers one
//! question per query: is there a stored reference value among the query's
//! candidate buckets that loosely contains the query, or is loosely
//! contained by it?
//!
//! ## Core Types
//!
//! - [`MatchType`]: direction of a hit, `contains_lookup` (reference inside
//!   query) or `lookup_contains` (query inside reference).
//! - [`MatchResult`]: `found`, `matched_value`, `match_type`.
//! - [`LookupCache`]: concurrent memo of positive results, unbounded or LRU
//!   per [`CachePolicy`].
//! - [`LookupEngine`]: index + loose matcher + cache, shared by every worker.
//! - [`LookupObserver`]: optional per-engine metrics hook.
//!
//! ## Example Usage
//!
//! ```
//! use matcher::{LookupEngine, MatchType};
//!
//! let engine = LookupEngine::in_memory_default().unwrap();
//! engine.index().load(["John Smith", "Jane Doe"]).unwrap();
//!
//! let hit = engine.lookup("Mr John Smith Jr").unwrap();
//! assert!(hit.found);
//! assert_eq!(hit.matched_value, "john smith");
//! assert_eq!(hit.match_type, MatchType::ContainsLookup);
//!
//! let miss = engine.lookup("smith john").unwrap();
//! assert!(!miss.found);
//! ```
//!
//! ## Matching Policy
//!
//! Candidates come from `PrefixIndex::scan_candidates`: the query's own
//! bucket in ascending key order, then the buckets starting at each later
//! position of the query. The first one that matches in either direction
//! wins. It is not the longest or closest candidate. A reference value that
//! contains the query but starts with different characters is never
//! considered.

pub mod cache;
pub mod engine;
pub mod loose;
pub mod metrics;
pub mod types;

pub use crate::cache::{CachePolicy, LookupCache};
pub use crate::engine::LookupEngine;
pub use crate::loose::{fold, loose_contains, match_type, FoldedQuery};
pub use crate::metrics::{LookupObserver, LookupOutcome};
pub use crate::types::{CacheStats, Lookup, MatchError, MatchResult, MatchType};
