//! Query normalization.
//!
//! Turns a raw user utterance into the token form the match engine works
//! on:
//!
//! 1. Lower-case the text.
//! 2. Drop every character that is neither alphanumeric nor whitespace.
//! 3. Split on whitespace, dropping tokens shorter than
//!    [`MIN_TOKEN_CHARS`] characters and stop-words.
//! 4. For each dictionary entry `source → target` whose source occurs in
//!    the lower-cased raw text, append `target` once unless it is already
//!    present.
//!
//! If no token survives step 3 the normalized query is empty, and an empty
//! query never matches anything.
//!
//! # Example
//!
//! ```rust
//! use catalog_assistant_core::normalize::QueryNormalizer;
//! use catalog_assistant_core::vocabulary::Vocabulary;
//!
//! let vocab = Vocabulary {
//!     version: 1,
//!     stop_words: vec!["fiyatı".into()],
//!     terms: [("gümüş".to_string(), "silver".to_string())].into(),
//!     ..Default::default()
//! };
//! let normalizer = QueryNormalizer::new(&vocab);
//! assert_eq!(normalizer.normalize("Nano gümüş fiyatı?"), "nano gümüş silver");
//! assert_eq!(normalizer.normalize("a b ?!"), "");
//! ```

use std::collections::HashSet;

use crate::vocabulary::Vocabulary;

/// Tokens shorter than this (in characters) are discarded.
pub const MIN_TOKEN_CHARS: usize = 3;

/// The analyzed form of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Tokens that survived filtering, in input order.
    pub tokens: Vec<String>,
    /// Dictionary equivalents appended after the tokens.
    pub additions: Vec<String>,
    /// Match groups for fuzzy scoring. Each group is one query term plus the
    /// dictionary equivalents that stand in for it; a group is satisfied
    /// when any member matches.
    pub groups: Vec<Vec<String>>,
}

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Space-joined tokens followed by the dictionary additions.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .chain(self.additions.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Space-joined tokens without dictionary additions.
    pub fn base_text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Stateless normalizer built from a [`Vocabulary`].
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    stop_words: HashSet<String>,
    terms: Vec<(String, String)>,
}

impl QueryNormalizer {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        Self {
            stop_words: vocabulary
                .stop_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
            terms: vocabulary
                .terms
                .iter()
                .map(|(s, t)| (s.to_lowercase(), t.to_lowercase()))
                .collect(),
        }
    }

    /// Normalize `raw` into a single space-separated string.
    pub fn normalize(&self, raw: &str) -> String {
        self.analyze(raw).text()
    }

    /// Normalize `raw`, keeping the token structure the fuzzy search needs.
    pub fn analyze(&self, raw: &str) -> NormalizedQuery {
        let tokens = self.tokens(raw);
        if tokens.is_empty() {
            return NormalizedQuery::default();
        }

        let lowered = raw.to_lowercase();
        let mut groups: Vec<Vec<String>> = tokens.iter().map(|t| vec![t.clone()]).collect();
        let mut additions: Vec<String> = Vec::new();

        for (source, target) in &self.terms {
            if !lowered.contains(source.as_str()) {
                continue;
            }
            let present = contains_phrase(&tokens, target)
                || additions.iter().any(|a| a == target);
            if present {
                continue;
            }
            additions.push(target.clone());

            let source_clean = strip_punctuation(source);
            let mut attached = false;
            for group in groups.iter_mut() {
                let head = &group[0];
                if head.contains(source_clean.as_str()) || source_clean.contains(head.as_str()) {
                    group.push(target.clone());
                    attached = true;
                }
            }
            if !attached {
                groups.push(vec![target.clone()]);
            }
        }

        NormalizedQuery {
            tokens,
            additions,
            groups,
        }
    }

    /// Lower-cased, punctuation-free tokens that pass the length and
    /// stop-word filters. Also used to normalize product names.
    pub fn tokens(&self, raw: &str) -> Vec<String> {
        strip_punctuation(&raw.to_lowercase())
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|t| !self.stop_words.contains(*t))
            .map(str::to_string)
            .collect()
    }
}

/// Removes every character that is neither alphanumeric nor whitespace.
pub fn strip_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() {
        return true;
    }
    tokens
        .windows(words.len())
        .any(|w| w.iter().zip(&words).all(|(a, b)| a == b))
}
