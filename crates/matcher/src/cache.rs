//! Memoization of positive lookup results.
//!
//! Only `found = true` results are ever stored; a query that missed keeps
//! missing (and keeps re-scanning its bucket) on every call.
//!
//! The default [`CachePolicy::Unbounded`] never evicts, so memory grows
//! with the number of distinct matched queries for the lifetime of the
//! cache. [`CachePolicy::Lru`] bounds it at the cost of re-scanning evicted
//! queries.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use dashmap::DashMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::types::MatchResult;

/// How the lookup cache stores entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Sharded concurrent map, no eviction and no capacity bound.
    #[default]
    Unbounded,
    /// Least-recently-used eviction once `capacity` entries are held.
    Lru { capacity: usize },
}

enum Store {
    Unbounded(DashMap<String, MatchResult>),
    Lru(Mutex<LruCache<String, MatchResult>>),
}

/// Concurrent query → result memo table.
///
/// A `put` is visible to every `get` issued after it returns, from any
/// thread.
pub struct LookupCache {
    store: Store,
}

impl LookupCache {
    pub fn new(policy: CachePolicy) -> Self {
        let store = match policy {
            CachePolicy::Unbounded => Store::Unbounded(DashMap::new()),
            CachePolicy::Lru { capacity } => {
                let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
                Store::Lru(Mutex::new(LruCache::new(capacity)))
            }
        };
        Self { store }
    }

    pub fn unbounded() -> Self {
        Self::new(CachePolicy::Unbounded)
    }

    pub fn get(&self, query: &str) -> Option<MatchResult> {
        match &self.store {
            Store::Unbounded(map) => map.get(query).map(|entry| entry.value().clone()),
            Store::Lru(lru) => {
                let mut guard = lru.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.get(query).cloned()
            }
        }
    }

    /// Store a result. Negative results are ignored.
    pub fn put(&self, query: &str, result: &MatchResult) {
        if !result.found {
            return;
        }
        match &self.store {
            Store::Unbounded(map) => {
                map.insert(query.to_string(), result.clone());
            }
            Store::Lru(lru) => {
                let mut guard = lru.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.put(query.to_string(), result.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.store {
            Store::Unbounded(map) => map.len(),
            Store::Lru(lru) => lru
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match &self.store {
            Store::Unbounded(map) => map.clear(),
            Store::Lru(lru) => lru
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear(),
        }
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchType;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn negative_results_are_not_stored() {
        let cache = LookupCache::unbounded();
        cache.put("nobody", &MatchResult::not_found());
        assert!(cache.get("nobody").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn positive_results_round_trip() {
        let cache = LookupCache::unbounded();
        let hit = MatchResult::matched("john smith", MatchType::ContainsLookup);
        cache.put("mr john smith", &hit);
        assert_eq!(cache.get("mr john smith"), Some(hit));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_evicts_oldest() {
        let cache = LookupCache::new(CachePolicy::Lru { capacity: 2 });
        let hit = MatchResult::matched("x", MatchType::LookupContains);
        cache.put("a", &hit);
        cache.put("b", &hit);
        cache.get("a");
        cache.put("c", &hit);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_lru_still_holds_one() {
        let cache = LookupCache::new(CachePolicy::Lru { capacity: 0 });
        cache.put("a", &MatchResult::matched("a", MatchType::ContainsLookup));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn puts_are_visible_across_threads() {
        let cache = Arc::new(LookupCache::unbounded());
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("q-{i}-{j}");
                        let hit = MatchResult::matched(key.clone(), MatchType::ContainsLookup);
                        cache.put(&key, &hit);
                    }
                })
            })
            .collect();
        for handle in writers {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 800);
        assert_eq!(
            cache.get("q-7-99").map(|r| r.matched_value),
            Some("q-7-99".to_string())
        );
    }

    #[test]
    fn policy_deserializes_from_tagged_form() {
        let policy: CachePolicy =
            serde_json::from_str(r#"{"policy":"lru","capacity":128}"#).unwrap();
        assert_eq!(policy, CachePolicy::Lru { capacity: 128 });
        let policy: CachePolicy = serde_json::from_str(r#"{"policy":"unbounded"}"#).unwrap();
        assert_eq!(policy, CachePolicy::Unbounded);
    }
}
