use index::IndexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which direction a loose containment match went.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MatchType {
    /// The stored reference value was found inside the query.
    #[serde(rename = "contains_lookup")]
    ContainsLookup,
    /// The query was found inside the stored reference value.
    #[serde(rename = "lookup_contains")]
    LookupContains,
    /// Neither string contains the other.
    #[default]
    #[serde(rename = "")]
    None,
}

impl MatchType {
    /// Wire/file representation; empty for [`MatchType::None`].
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ContainsLookup => "contains_lookup",
            MatchType::LookupContains => "lookup_contains",
            MatchType::None => "",
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, MatchType::None)
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one lookup. `match_type` is `None` exactly when `found` is false.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub found: bool,
    pub matched_value: String,
    pub match_type: MatchType,
}

impl MatchResult {
    /// The negative result.
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn matched(value: impl Into<String>, match_type: MatchType) -> Self {
        debug_assert!(match_type.is_match());
        Self {
            found: true,
            matched_value: value.into(),
            match_type,
        }
    }
}

/// A lookup result plus whether this particular call was served from cache.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Lookup {
    #[serde(flatten)]
    pub result: MatchResult,
    pub cache_hit: bool,
}

/// Snapshot of an engine's cache counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CacheStats {
    #[serde(rename = "cache_hits")]
    pub hits: u64,
    #[serde(rename = "cache_misses")]
    pub misses: u64,
    #[serde(rename = "cache_entries")]
    pub entries: u64,
}

/// Errors produced by the matching layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Index read or scan failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

impl MatchError {
    /// Whether the underlying store is gone for every caller, not just this lookup.
    pub fn is_fatal(&self) -> bool {
        match self {
            MatchError::Index(err) => err.is_fatal(),
        }
    }
}
