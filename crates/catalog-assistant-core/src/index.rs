//! Weighted multi-field catalog index and approximate matching.
//!
//! Every product is pre-processed once into lower-cased field texts so that
//! searches never touch the raw records. Fuzzy scoring uses approximate
//! substring matching: the score of a pattern against a field is the
//! minimum number of edits needed to make the pattern appear anywhere in
//! the field, divided by the pattern length. `0.0` is an exact occurrence,
//! `1.0` is no resemblance at all.
//!
//! # Field weights
//!
//! | Field | Weight |
//! |-------|--------|
//! | `search_keywords` | 1.0 |
//! | `applications` | 0.8 |
//! | `project_types` | 0.7 |
//! | `name` | 0.6 |
//! | `technical_notes` | 0.5 |
//! | `benefits` | 0.4 |
//! | `category` | 0.3 |

use crate::models::Product;
use crate::normalize::{strip_punctuation, QueryNormalizer};

/// A searchable product field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SearchKeywords,
    Applications,
    ProjectTypes,
    Name,
    TechnicalNotes,
    Benefits,
    Category,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::SearchKeywords,
        Field::Applications,
        Field::ProjectTypes,
        Field::Name,
        Field::TechnicalNotes,
        Field::Benefits,
        Field::Category,
    ];

    pub fn weight(self) -> f64 {
        match self {
            Field::SearchKeywords => 1.0,
            Field::Applications => 0.8,
            Field::ProjectTypes => 0.7,
            Field::Name => 0.6,
            Field::TechnicalNotes => 0.5,
            Field::Benefits => 0.4,
            Field::Category => 0.3,
        }
    }

    fn text_of(self, p: &Product) -> String {
        match self {
            Field::SearchKeywords => p.search_keywords.join(" "),
            Field::Applications => p.applications.join(" "),
            Field::ProjectTypes => p.project_types.join(" "),
            Field::Name => p.name.clone(),
            Field::TechnicalNotes => p.technical_notes.clone().unwrap_or_default(),
            Field::Benefits => p.benefits.join(" "),
            Field::Category => [p.category.as_deref(), p.subcategory.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A product plus its pre-computed search representations.
#[derive(Debug, Clone)]
pub struct IndexedProduct {
    pub product: Product,
    /// Position in the source catalog; the final tie-breaker in ranking.
    pub position: usize,
    /// `name` lower-cased.
    pub name_lower: String,
    /// `name` lower-cased without punctuation, every token kept.
    pub name_plain: String,
    /// `name` run through the query normalizer's token filter.
    pub name_normalized: String,
    /// All descriptive text, lower-cased, used by application expansion.
    pub serialized: String,
    /// Non-empty fields as `(field, lower-cased punctuation-free text)`.
    pub fields: Vec<(Field, String)>,
}

/// Immutable, searchable snapshot of the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: Vec<IndexedProduct>,
}

impl CatalogIndex {
    /// Index `products`, skipping records whose name is blank.
    pub fn new(products: Vec<Product>, normalizer: &QueryNormalizer) -> Self {
        let entries = products
            .into_iter()
            .filter(|p| !p.name.trim().is_empty())
            .enumerate()
            .map(|(position, product)| {
                let fields: Vec<(Field, String)> = Field::ALL
                    .iter()
                    .map(|f| (*f, collapse(&strip_punctuation(&f.text_of(&product).to_lowercase()))))
                    .filter(|(_, text)| !text.is_empty())
                    .collect();
                let serialized = serialize_lower(&product);
                IndexedProduct {
                    name_lower: product.name.to_lowercase(),
                    name_plain: plain_text(&product.name),
                    name_normalized: normalizer.tokens(&product.name).join(" "),
                    serialized,
                    fields,
                    position,
                    product,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[IndexedProduct] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original product records, in catalog order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.entries.iter().map(|e| &e.product)
    }
}

/// Lower-case `text`, drop punctuation, and collapse whitespace.
pub fn plain_text(text: &str) -> String {
    collapse(&strip_punctuation(&text.to_lowercase()))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn serialize_lower(p: &Product) -> String {
    let mut parts: Vec<&str> = vec![p.name.as_str()];
    parts.extend(p.search_keywords.iter().map(String::as_str));
    parts.extend(p.applications.iter().map(String::as_str));
    parts.extend(p.project_types.iter().map(String::as_str));
    parts.extend(p.benefits.iter().map(String::as_str));
    for opt in [
        &p.technical_notes,
        &p.category,
        &p.subcategory,
        &p.description,
    ] {
        if let Some(s) = opt {
            parts.push(s.as_str());
        }
    }
    parts.join(" ").to_lowercase()
}

/// Approximate substring distance of `pattern` inside `text`, normalized
/// by pattern length to `[0.0, 1.0]`.
///
/// Uses the Sellers variant of edit distance: the match may start and end
/// anywhere in `text`, so only edits to the pattern itself are counted.
pub fn approximate_distance(pattern: &str, text: &str) -> f64 {
    let p: Vec<char> = pattern.chars().collect();
    if p.is_empty() {
        return 0.0;
    }
    if text.contains(pattern) {
        return 0.0;
    }
    let t: Vec<char> = text.chars().collect();
    if t.is_empty() {
        return 1.0;
    }

    // prev[i] = edits to match p[..i] ending at the previous text position.
    let mut prev: Vec<usize> = (0..=p.len()).collect();
    let mut curr: Vec<usize> = vec![0; p.len() + 1];
    let mut best = p.len();

    for tc in &t {
        curr[0] = 0;
        for i in 1..=p.len() {
            let cost = if p[i - 1] == *tc { 0 } else { 1 };
            curr[i] = (prev[i - 1] + cost)
                .min(prev[i] + 1)
                .min(curr[i - 1] + 1);
        }
        best = best.min(curr[p.len()]);
        std::mem::swap(&mut prev, &mut curr);
    }

    (best as f64 / p.len() as f64).min(1.0)
}

/// Score of a grouped query against one field text.
///
/// Each group contributes its best member's distance; the field score is
/// the mean over groups.
pub fn field_distance(groups: &[Vec<String>], text: &str) -> f64 {
    if groups.is_empty() {
        return 1.0;
    }
    let total: f64 = groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|member| approximate_distance(member, text))
                .fold(1.0, f64::min)
        })
        .sum();
    total / groups.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    #[test]
    fn test_exact_occurrence_is_zero() {
        assert_eq!(approximate_distance("silver", "nano silver powder"), 0.0);
    }

    #[test]
    fn test_single_typo_is_small() {
        let d = approximate_distance("slver", "nano silver powder");
        assert!(d > 0.0 && d <= 0.2, "distance was {}", d);
        let d = approximate_distance("grafen", "graphene oxide");
        assert!(d <= 0.35, "distance was {}", d);
    }

    #[test]
    fn test_unrelated_is_large() {
        let d = approximate_distance("epoksi", "nano silver powder");
        assert!(d > 0.35, "distance was {}", d);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(approximate_distance("", "anything"), 0.0);
        assert_eq!(approximate_distance("silver", ""), 1.0);
    }

    #[test]
    fn test_field_distance_uses_best_group_member() {
        let groups = vec![
            vec!["nano".to_string()],
            vec!["gümüş".to_string(), "silver".to_string()],
        ];
        assert_eq!(field_distance(&groups, "nano silver powder"), 0.0);
    }

    #[test]
    fn test_index_skips_blank_names_and_keeps_order() {
        let normalizer = QueryNormalizer::new(&Vocabulary::default());
        let idx = CatalogIndex::new(
            vec![
                Product::named("Graphene Oxide"),
                Product::named("  "),
                Product::named("Nano Silver Powder"),
            ],
            &normalizer,
        );
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.entries()[1].position, 1);
        assert_eq!(idx.entries()[1].name_normalized, "nano silver powder");
    }

    #[test]
    fn test_index_collects_category_and_subcategory() {
        let normalizer = QueryNormalizer::new(&Vocabulary::default());
        let mut p = Product::named("TiO2");
        p.category = Some("Metal Oksitler".into());
        p.subcategory = Some("Titanyum".into());
        let idx = CatalogIndex::new(vec![p], &normalizer);
        let category = idx.entries()[0]
            .fields
            .iter()
            .find(|(f, _)| *f == Field::Category)
            .map(|(_, t)| t.as_str());
        assert_eq!(category, Some("metal oksitler titanyum"));
    }
}
