//! Loose (case, diacritic and width insensitive) containment matching.
//!
//! Both sides are folded the same way before a plain substring test:
//! NFKD compatibility decomposition, lowercase, then combining marks are
//! dropped. "Crème Brûlée", "CREME BRULEE" and full-width "ｃｒｅｍｅ" all fold
//! to the same letters.

use std::borrow::Cow;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::MatchType;

/// Fold a string for loose comparison. ASCII input only needs lowercasing.
pub fn fold(input: &str) -> Cow<'_, str> {
    if input.is_ascii() {
        if input.bytes().any(|b| b.is_ascii_uppercase()) {
            return Cow::Owned(input.to_ascii_lowercase());
        }
        return Cow::Borrowed(input);
    }
    Cow::Owned(
        input
            .nfkd()
            .flat_map(char::to_lowercase)
            .filter(|c| !is_combining_mark(*c))
            .collect(),
    )
}

/// Loose substring test: is `needle` inside `haystack`?
pub fn loose_contains(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(fold(needle).as_ref())
}

/// Decide how `query` and `candidate` relate.
///
/// `ContainsLookup` is checked first, so equal strings report it.
pub fn match_type(query: &str, candidate: &str) -> MatchType {
    FoldedQuery::new(query).match_candidate(candidate)
}

/// A query folded once and compared against many candidates.
#[derive(Debug, Clone)]
pub struct FoldedQuery<'a> {
    folded: Cow<'a, str>,
}

impl<'a> FoldedQuery<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            folded: fold(query),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.folded
    }

    pub fn match_candidate(&self, candidate: &str) -> MatchType {
        let candidate = fold(candidate);
        if self.folded.contains(candidate.as_ref()) {
            MatchType::ContainsLookup
        } else if candidate.contains(self.folded.as_ref()) {
            MatchType::LookupContains
        } else {
            MatchType::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_inside_query() {
        assert_eq!(
            match_type("mr john smith jr", "john smith"),
            MatchType::ContainsLookup
        );
    }

    #[test]
    fn query_inside_candidate() {
        assert_eq!(match_type("a", "ab"), MatchType::LookupContains);
        assert_eq!(match_type("jane", "jane doe"), MatchType::LookupContains);
    }

    #[test]
    fn equal_strings_prefer_contains_lookup() {
        assert_eq!(match_type("acme", "acme"), MatchType::ContainsLookup);
    }

    #[test]
    fn unrelated_strings_do_not_match() {
        assert_eq!(match_type("john", "jane"), MatchType::None);
        assert_eq!(match_type("abc", "abd"), MatchType::None);
    }

    #[test]
    fn diacritics_and_case_are_ignored() {
        assert_eq!(
            match_type("café de flore", "CAFE"),
            MatchType::ContainsLookup
        );
        assert_eq!(match_type("jose", "josé garcía"), MatchType::LookupContains);
        assert!(loose_contains("Crème Brûlée", "creme brulee"));
    }

    #[test]
    fn compatibility_capitals_fold_to_lowercase() {
        assert_eq!(fold("ℌello"), "hello");
        assert_eq!(fold("𝐀cme"), "acme");
        assert_eq!(match_type("hello", "ℌello"), MatchType::ContainsLookup);
        assert_eq!(match_type("𝐀𝐂𝐌𝐄 corp", "acme"), MatchType::ContainsLookup);
    }

    #[test]
    fn width_variants_fold() {
        assert!(loose_contains("ｃｒｅｍｅ", "creme"));
    }

    #[test]
    fn fold_borrows_lowercase_ascii() {
        assert!(matches!(fold("already lower"), Cow::Borrowed(_)));
        assert_eq!(fold("MiXeD"), "mixed");
    }

    #[test]
    fn match_type_is_deterministic() {
        let pairs = [
            ("mr john smith jr", "john smith"),
            ("a", "ab"),
            ("zoë", "zoe"),
            ("x", "y"),
        ];
        for (q, c) in pairs {
            let first = match_type(q, c);
            for _ in 0..5 {
                assert_eq!(match_type(q, c), first);
            }
        }
    }
}
