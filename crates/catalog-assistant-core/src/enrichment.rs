//! Catalog enrichment records.
//!
//! An enrichment is the descriptive corpus a language model writes for one
//! product from its name alone: category, applications, benefits, project
//! types, technical notes, and search keywords. These are the fields the
//! match engine weighs most, so a bare catalog of names becomes searchable
//! by application and in the customer's language.
//!
//! [`decode_enrichment`] is strict in the same way as lead decoding: the
//! output must hold a JSON object of the expected shape with at least one
//! descriptive field, or the caller keeps the product unchanged.

use serde::Deserialize;

use crate::lead::{json_object, ExtractionError};
use crate::models::{string_or_list, Product};

/// Model-written descriptive fields for one product.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub applications: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub benefits: Vec<String>,
    #[serde(default, alias = "projectTypes", deserialize_with = "string_or_list")]
    pub project_types: Vec<String>,
    #[serde(default, alias = "technicalNotes")]
    pub technical_notes: Option<String>,
    #[serde(
        default,
        alias = "searchKeywords",
        deserialize_with = "string_or_list"
    )]
    pub search_keywords: Vec<String>,
}

impl Enrichment {
    fn is_empty(&self) -> bool {
        blank(&self.category)
            && blank(&self.subcategory)
            && blank(&self.technical_notes)
            && self.applications.is_empty()
            && self.benefits.is_empty()
            && self.project_types.is_empty()
            && self.search_keywords.is_empty()
    }

    /// Merge into `product`.
    ///
    /// Scalar fields fill only what the product lacks. List fields keep the
    /// product's entries first and append new ones, skipping
    /// case-insensitive duplicates. Name, price, stock, and links are never
    /// touched.
    pub fn apply_to(&self, product: &mut Product) {
        fill(&mut product.category, &self.category);
        fill(&mut product.subcategory, &self.subcategory);
        fill(&mut product.technical_notes, &self.technical_notes);
        merge(&mut product.applications, &self.applications);
        merge(&mut product.benefits, &self.benefits);
        merge(&mut product.project_types, &self.project_types);
        merge(&mut product.search_keywords, &self.search_keywords);
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    if blank(slot) && !blank(value) {
        *slot = value.as_ref().map(|s| s.trim().to_string());
    }
}

fn merge(list: &mut Vec<String>, extra: &[String]) {
    for item in extra {
        let item = item.trim();
        let lowered = item.to_lowercase();
        if item.is_empty() || list.iter().any(|e| e.to_lowercase() == lowered) {
            continue;
        }
        list.push(item.to_string());
    }
}

/// Decode collaborator output into an [`Enrichment`].
///
/// Accepts the object bare or wrapped in prose or a code fence. An object
/// with no usable descriptive field is [`ExtractionError::WrongShape`].
pub fn decode_enrichment(raw: &str) -> Result<Enrichment, ExtractionError> {
    let enrichment: Enrichment = serde_json::from_value(json_object(raw)?)?;
    if enrichment.is_empty() {
        return Err(ExtractionError::WrongShape("no descriptive fields".into()));
    }
    Ok(enrichment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_record() {
        let raw = r#"```json
{
  "name": "Nano Silver Powder",
  "category": "Metal Nanoparticles",
  "subcategory": "Silver",
  "properties": {"particle_size": "20 nm", "purity": "99.9%"},
  "applications": ["conductive ink", "antibacterial textile"],
  "benefits": ["high conductivity"],
  "project_types": ["conductive ink production"],
  "technical_notes": "Store away from light",
  "search_keywords": "gümüş, silver, ag"
}
```"#;
        let e = decode_enrichment(raw).unwrap();
        assert_eq!(e.category.as_deref(), Some("Metal Nanoparticles"));
        assert_eq!(e.applications.len(), 2);
        assert_eq!(e.search_keywords, vec!["gümüş", "silver", "ag"]);
    }

    #[test]
    fn test_decode_rejects_empty_and_malformed() {
        assert!(matches!(
            decode_enrichment(r#"{"name": "X", "applications": []}"#),
            Err(ExtractionError::WrongShape(_))
        ));
        assert!(matches!(
            decode_enrichment("I could not find this product."),
            Err(ExtractionError::NoJson)
        ));
        assert!(matches!(
            decode_enrichment(r#"{"category": ["a", "b"]}"#),
            Err(ExtractionError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_apply_keeps_existing_and_merges_lists() {
        let mut product = Product::named("Nano Silver Powder");
        product.category = Some("Metals".into());
        product.price = Some("1250".into());
        product.search_keywords = vec!["Silver".into()];

        let enrichment = Enrichment {
            category: Some("Metal Nanoparticles".into()),
            subcategory: Some(" Silver ".into()),
            applications: vec!["conductive ink".into()],
            search_keywords: vec!["silver".into(), "gümüş".into(), " ".into()],
            ..Default::default()
        };
        enrichment.apply_to(&mut product);

        assert_eq!(product.name, "Nano Silver Powder");
        assert_eq!(product.category.as_deref(), Some("Metals"));
        assert_eq!(product.subcategory.as_deref(), Some("Silver"));
        assert_eq!(product.price.as_deref(), Some("1250"));
        assert_eq!(product.applications, vec!["conductive ink"]);
        assert_eq!(product.search_keywords, vec!["Silver", "gümüş"]);
    }
}
