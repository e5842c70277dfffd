//! Core data models used throughout Catalog Assistant.
//!
//! These types represent the catalog products, chat messages, lead
//! candidates, and captured lead records that flow through the matching
//! and lead-capture pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One sellable catalog item.
///
/// Only `name` is required. Every other field is descriptive corpus used
/// for matching and for the reply context. Field names accept both the
/// snake_case shape produced by the enrichment job and camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(
        default,
        alias = "searchKeywords",
        deserialize_with = "string_or_list"
    )]
    pub search_keywords: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub applications: Vec<String>,
    #[serde(default, alias = "projectTypes", deserialize_with = "string_or_list")]
    pub project_types: Vec<String>,
    #[serde(default, alias = "technicalNotes")]
    pub technical_notes: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub price: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "stockStatus")]
    pub stock_status: Option<String>,
}

impl Product {
    /// Convenience constructor for a product with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Accepts `"a, b"`, `["a", "b"]`, or `null` for list-valued corpus fields.
pub(crate) fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<serde_json::Value>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s
            .split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(OneOrMany::Many(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
    })
}

/// Prices show up as numbers in some exports and strings in others.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        },
    )
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Name and phone recovered from a message, before it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadCandidate {
    pub name: String,
    pub phone: String,
}

impl LeadCandidate {
    /// Builds a candidate when both fields are non-empty after trimming.
    pub fn new(name: &str, phone: &str) -> Option<Self> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() || phone.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            phone: phone.to_string(),
        })
    }
}

/// A captured sales inquiry, as appended to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadRecord {
    /// Unique per capture event.
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Raw user message, verbatim.
    #[serde(rename = "message")]
    pub captured_from: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_product_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// SHA-256 of the lower-cased name and the phone digits. Identical for
    /// repeated captures of the same person, so sinks can deduplicate.
    pub fingerprint: String,
}

impl LeadRecord {
    pub fn new(
        candidate: LeadCandidate,
        captured_from: &str,
        associated_product_query: Option<String>,
        session_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let fingerprint = lead_fingerprint(&candidate.name, &candidate.phone);
        Self {
            id: Uuid::new_v4().to_string(),
            name: candidate.name,
            phone: candidate.phone,
            captured_from: captured_from.to_string(),
            timestamp,
            associated_product_query,
            session_id,
            fingerprint,
        }
    }
}

/// Deduplication fingerprint for a lead.
pub fn lead_fingerprint(name: &str, phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    // Compare on the last ten digits so "+90 532..." and "0532..." agree.
    let tail = &digits[digits.len().saturating_sub(10)..];
    let mut hasher = Sha256::new();
    hasher.update(name.trim().to_lowercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(tail.as_bytes());
    hex::encode(hasher.finalize())
}
