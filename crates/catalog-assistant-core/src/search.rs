//! Match engine: ranks catalog products against a free-text query.
//!
//! Three strategies each score candidates independently; the results are
//! merged by taking each product's best score.
//!
//! # Ranking Algorithm
//!
//! 1. Normalize the query. An empty normalized query returns no results.
//! 2. **Application expansion**: if the lower-cased raw query contains an
//!    application phrase, every product whose text contains one of the
//!    phrase's fragments scores [`APPLICATION_SCORE`].
//! 3. **Fuzzy search**: each indexed field is scored with
//!    [`field_distance`]; fields at or under the threshold contribute
//!    `weight × (1 − distance)`. The best field gives
//!    `FUZZY_BASE + FUZZY_SPAN × relevance`.
//! 4. **Name match**: a product whose full name equals the raw query
//!    (ignoring case and punctuation) scores [`NAME_VERBATIM_SCORE`]; one
//!    whose normalized name equals the normalized query scores
//!    [`NAME_EXACT_SCORE`]; one whose name contains the query (or is
//!    mentioned by it) scores [`NAME_CONTAINS_SCORE`]. The verbatim band
//!    separates names that differ only in short tokens such as element
//!    symbols ("Ag Nanoparticles", "Au Nanoparticles").
//! 5. Merge: keep the maximum score per product.
//! 6. Sort by score (desc), then catalog position (asc).
//! 7. Deduplicate by case-insensitive name, first occurrence wins.
//! 8. Truncate to `max_results`.
//!
//! The score bands do not overlap, so a name match always outranks an
//! application match, which always outranks a fuzzy match.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::index::{field_distance, plain_text, CatalogIndex};
use crate::models::Product;
use crate::normalize::QueryNormalizer;
use crate::vocabulary::Vocabulary;

pub const NAME_VERBATIM_SCORE: f64 = 5.0;
pub const NAME_EXACT_SCORE: f64 = 4.0;
pub const NAME_CONTAINS_SCORE: f64 = 3.0;
pub const APPLICATION_SCORE: f64 = 2.0;
pub const FUZZY_BASE: f64 = 1.0;
pub const FUZZY_SPAN: f64 = 0.99;

/// Matching tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Maximum results to return.
    pub max_results: usize,
    /// Highest accepted fuzzy distance, `0.0` exact to `1.0` anything.
    pub fuzzy_threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: 10,
            fuzzy_threshold: 0.35,
        }
    }
}

/// Which strategy produced a match's winning score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NameExact,
    NameContains,
    Application,
    Fuzzy,
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct ProductMatch {
    pub product: Product,
    pub score: f64,
    pub strategy: Strategy,
}

/// Multi-strategy product matcher.
///
/// Holds only configuration; the catalog is passed to every call so that a
/// hot reload never races an in-flight search.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    normalizer: QueryNormalizer,
    applications: Vec<(String, Vec<String>)>,
    params: SearchParams,
}

impl MatchEngine {
    pub fn new(vocabulary: &Vocabulary, params: SearchParams) -> Self {
        Self {
            normalizer: QueryNormalizer::new(vocabulary),
            applications: vocabulary
                .applications
                .iter()
                .map(|(phrase, fragments)| (phrase.to_lowercase(), fragments.clone()))
                .collect(),
            params,
        }
    }

    pub fn normalizer(&self) -> &QueryNormalizer {
        &self.normalizer
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Build a searchable index using this engine's normalizer.
    pub fn index(&self, products: Vec<Product>) -> CatalogIndex {
        CatalogIndex::new(products, &self.normalizer)
    }

    /// Rank `catalog` against `raw_query`, best first.
    pub fn search(&self, raw_query: &str, catalog: &CatalogIndex) -> Vec<ProductMatch> {
        let query = self.normalizer.analyze(raw_query);
        if query.is_empty() || catalog.is_empty() {
            return Vec::new();
        }

        let mut best: HashMap<usize, (f64, Strategy)> = HashMap::new();
        let mut bump = |slot: usize, score: f64, strategy: Strategy| {
            let entry = best.entry(slot).or_insert((score, strategy));
            if score > entry.0 {
                *entry = (score, strategy);
            }
        };

        // Application expansion
        let lowered = raw_query.to_lowercase();
        let fragments: Vec<&str> = self
            .applications
            .iter()
            .filter(|(phrase, _)| lowered.contains(phrase.as_str()))
            .flat_map(|(_, fragments)| fragments.iter().map(String::as_str))
            .collect();
        if !fragments.is_empty() {
            for (slot, entry) in catalog.entries().iter().enumerate() {
                if fragments.iter().any(|f| entry.serialized.contains(f)) {
                    bump(slot, APPLICATION_SCORE, Strategy::Application);
                }
            }
        }

        // Fuzzy search
        for (slot, entry) in catalog.entries().iter().enumerate() {
            let relevance = entry
                .fields
                .iter()
                .filter_map(|(field, text)| {
                    let d = field_distance(&query.groups, text);
                    (d <= self.params.fuzzy_threshold).then(|| field.weight() * (1.0 - d))
                })
                .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))));
            if let Some(r) = relevance {
                bump(slot, FUZZY_BASE + FUZZY_SPAN * r, Strategy::Fuzzy);
            }
        }

        // Name match
        let full = query.text();
        let base = query.base_text();
        let padded_base = format!(" {} ", base);
        let raw_plain = plain_text(raw_query);
        for (slot, entry) in catalog.entries().iter().enumerate() {
            if entry.name_plain == raw_plain {
                bump(slot, NAME_VERBATIM_SCORE, Strategy::NameExact);
            } else if entry.name_lower == base || entry.name_normalized == base {
                bump(slot, NAME_EXACT_SCORE, Strategy::NameExact);
            } else if entry.name_lower.contains(&full)
                || entry.name_lower.contains(&base)
                || entry.name_normalized.contains(&base)
                || (!entry.name_normalized.is_empty()
                    && padded_base.contains(&format!(" {} ", entry.name_normalized)))
            {
                bump(slot, NAME_CONTAINS_SCORE, Strategy::NameContains);
            }
        }

        let mut ranked: Vec<(usize, f64, Strategy)> =
            best.into_iter().map(|(slot, (s, st))| (slot, s, st)).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();
        for (slot, score, strategy) in ranked {
            let entry = &catalog.entries()[slot];
            if !seen.insert(entry.name_lower.as_str()) {
                continue;
            }
            results.push(ProductMatch {
                product: entry.product.clone(),
                score,
                strategy,
            });
            if results.len() >= self.params.max_results {
                break;
            }
        }
        results
    }
}
