//! Lead detection and strict decoding of extraction output.
//!
//! Two pieces live here:
//!
//! - [`PhoneGate`]: a cheap regex check that decides whether a message is
//!   worth sending to the (costly) text-understanding collaborator at all.
//! - [`decode_extraction`]: turns whatever the collaborator returned into a
//!   tagged [`Extraction`] or an [`ExtractionError`]. It never panics;
//!   callers treat every error as "no lead".
//!
//! [`heuristic_candidate`] is an offline stand-in for the collaborator:
//! the phone from the gate plus the longest run of capitalized words as the
//! name.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::LeadCandidate;

/// Turkish numbers: optional `+90` / `0090` / `0` prefix, then a mobile
/// range `5xx` block, optionally grouped `3-3-2-2` with spaces, dots, or
/// dashes.
pub const DEFAULT_PHONE_PATTERN: &str =
    r"(?:(?:\+|00)?90[\s.-]?|0)?\(?5\d{2}\)?[\s.-]?\d{3}[\s.-]?\d{2}[\s.-]?\d{2}";

/// Digit count from which a message reads as an attempted phone number.
pub const PARTIAL_PHONE_DIGITS: usize = 7;

/// Regex gate for phone-number-shaped substrings.
#[derive(Debug, Clone)]
pub struct PhoneGate {
    re: Regex,
}

impl PhoneGate {
    /// Build a gate from a pattern. The pattern is anchored so it cannot
    /// match inside a longer run of digits.
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let anchored = format!(r"(?:^|[^\d+])({})(?:$|\D)", pattern);
        let re = Regex::new(&anchored)
            .map_err(|e| anyhow::anyhow!("invalid phone pattern '{}': {}", pattern, e))?;
        Ok(Self { re })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    /// Whether `text` carries a phone number, complete or not: a gate match
    /// or at least [`PARTIAL_PHONE_DIGITS`] digits.
    pub fn mentions_phone(&self, text: &str) -> bool {
        self.is_match(text)
            || text.chars().filter(char::is_ascii_digit).count() >= PARTIAL_PHONE_DIGITS
    }

    /// The first phone-shaped substring, trimmed.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
    }
}

impl Default for PhoneGate {
    fn default() -> Self {
        Self {
            re: Regex::new(&format!(r"(?:^|[^\d+])({})(?:$|\D)", DEFAULT_PHONE_PATTERN))
                .expect("default phone pattern is valid"),
        }
    }
}

/// Outcome of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(LeadCandidate),
    NotFound,
}

/// Why collaborator output could not be decoded.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no JSON object in extraction output")]
    NoJson,
    #[error("invalid JSON in extraction output: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unexpected extraction shape: {0}")]
    WrongShape(String),
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    found: Option<bool>,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    phone: Value,
}

/// Decode collaborator output into an [`Extraction`].
///
/// Accepts a bare JSON object or one wrapped in prose or a Markdown code
/// fence. The object must have `name` and `phone` as strings or nulls; an
/// explicit `"found": false` is the not-found marker. A result where either
/// field is blank is [`Extraction::NotFound`].
pub fn decode_extraction(raw: &str) -> Result<Extraction, ExtractionError> {
    let payload: Payload = serde_json::from_value(json_object(raw)?)?;

    if payload.found == Some(false) {
        return Ok(Extraction::NotFound);
    }

    let name = field_text("name", &payload.name)?;
    let phone = field_text("phone", &payload.phone)?;

    Ok(match LeadCandidate::new(&name, &phone) {
        Some(candidate) => Extraction::Found(candidate),
        None => Extraction::NotFound,
    })
}

/// The outermost JSON object in `raw`, which may be wrapped in prose or a
/// Markdown code fence.
pub(crate) fn json_object(raw: &str) -> Result<Value, ExtractionError> {
    let start = raw.find('{').ok_or(ExtractionError::NoJson)?;
    let end = raw.rfind('}').ok_or(ExtractionError::NoJson)?;
    if end < start {
        return Err(ExtractionError::NoJson);
    }

    let value: Value = serde_json::from_str(&raw[start..=end])?;
    if !value.is_object() {
        return Err(ExtractionError::WrongShape("not an object".into()));
    }
    Ok(value)
}

fn field_text(field: &str, value: &Value) -> Result<String, ExtractionError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => {
            let t = s.trim();
            match t.to_lowercase().as_str() {
                "null" | "none" | "n/a" | "unknown" | "-" => Ok(String::new()),
                _ => Ok(t.to_string()),
            }
        }
        // Some models emit the phone as a number.
        Value::Number(n) if field == "phone" => Ok(n.to_string()),
        other => Err(ExtractionError::WrongShape(format!(
            "{} is {}",
            field,
            type_name(other)
        ))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Offline name + phone extraction.
///
/// The phone is the gate's match. The name is the longest run of words
/// starting with an uppercase letter; failing that, the remaining words
/// when they are all alphabetic and there are at most four of them.
pub fn heuristic_candidate(text: &str, gate: &PhoneGate) -> Option<LeadCandidate> {
    let phone = gate.find(text)?;
    let rest = text.replacen(phone, " ", 1);

    let words: Vec<String> = rest
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()).to_string())
        .collect();

    let mut best: Vec<&str> = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    for w in &words {
        let capitalized = w
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
            && w.chars().all(char::is_alphabetic);
        if capitalized {
            run.push(w.as_str());
            if run.len() >= best.len() {
                best = run.clone();
            }
        } else {
            run.clear();
        }
    }

    let name = if !best.is_empty() {
        best.join(" ")
    } else {
        let plain: Vec<&str> = words
            .iter()
            .map(String::as_str)
            .filter(|w| !w.is_empty())
            .collect();
        if plain.is_empty() || plain.len() > 4 || !plain.iter().all(|w| w.chars().all(char::is_alphabetic)) {
            return None;
        }
        plain.join(" ")
    };

    LeadCandidate::new(&name, phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_accepts_common_formats() {
        let gate = PhoneGate::default();
        for text in [
            "05321234567",
            "Ali Veli 05321234567",
            "+90 532 123 45 67",
            "0090-532-123-45-67",
            "numaram 532 123 4567",
            "(532) 123 45 67 arayın",
        ] {
            assert!(gate.is_match(text), "should match {:?}", text);
        }
    }

    #[test]
    fn test_gate_rejects_non_phone_text() {
        let gate = PhoneGate::default();
        for text in [
            "Epoksi ile 600 derece",
            "nano gümüş fiyatı",
            "order 1234567",
            "053212345678901",
            "",
        ] {
            assert!(!gate.is_match(text), "should not match {:?}", text);
        }
    }

    #[test]
    fn test_mentions_phone_includes_partial_numbers() {
        let gate = PhoneGate::default();
        assert!(gate.mentions_phone("Ali Veli 05321234567"));
        assert!(gate.mentions_phone("Ali Veli, 0532 123 45"));
        assert!(!gate.is_match("Ali Veli, 0532 123 45"));
        assert!(!gate.mentions_phone("Epoksi ile 600 derece"));
        assert!(!gate.mentions_phone("sorry, which details?"));
    }

    #[test]
    fn test_gate_find_returns_number() {
        let gate = PhoneGate::default();
        assert_eq!(gate.find("Ali Veli 05321234567"), Some("05321234567"));
        assert_eq!(gate.find("tel: +90 532 123 45 67."), Some("+90 532 123 45 67"));
    }

    #[test]
    fn test_custom_pattern() {
        let gate = PhoneGate::new(r"\d{3}-\d{4}").unwrap();
        assert!(gate.is_match("call 555-1234"));
        assert!(PhoneGate::new("(").is_err());
    }

    #[test]
    fn test_decode_plain_object() {
        let out = decode_extraction(r#"{"name": "Ali Veli", "phone": "05321234567"}"#).unwrap();
        assert_eq!(
            out,
            Extraction::Found(LeadCandidate::new("Ali Veli", "05321234567").unwrap())
        );
    }

    #[test]
    fn test_decode_fenced_object_with_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"name\": \"Ayşe\", \"phone\": 5321234567}\n```";
        match decode_extraction(raw).unwrap() {
            Extraction::Found(c) => {
                assert_eq!(c.name, "Ayşe");
                assert_eq!(c.phone, "5321234567");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_not_found_marker() {
        assert_eq!(
            decode_extraction(r#"{"found": false}"#).unwrap(),
            Extraction::NotFound
        );
        assert_eq!(
            decode_extraction(r#"{"name": null, "phone": null}"#).unwrap(),
            Extraction::NotFound
        );
    }

    #[test]
    fn test_decode_partial_is_not_found() {
        assert_eq!(
            decode_extraction(r#"{"name": "Ali", "phone": ""}"#).unwrap(),
            Extraction::NotFound
        );
        assert_eq!(
            decode_extraction(r#"{"name": "N/A", "phone": "0532"}"#).unwrap(),
            Extraction::NotFound
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_extraction("I could not find anything."),
            Err(ExtractionError::NoJson)
        ));
        assert!(matches!(
            decode_extraction("{name: Ali, phone: 0532"),
            Err(ExtractionError::NoJson)
        ));
        assert!(matches!(
            decode_extraction("{name: 'Ali'}"),
            Err(ExtractionError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_extraction(r#"{"name": ["Ali"], "phone": "0532"}"#),
            Err(ExtractionError::WrongShape(_))
        ));
        assert!(matches!(
            decode_extraction("} oops {"),
            Err(ExtractionError::NoJson)
        ));
    }

    #[test]
    fn test_heuristic_candidate() {
        let gate = PhoneGate::default();
        let c = heuristic_candidate("Ali Veli 05321234567", &gate).unwrap();
        assert_eq!(c.name, "Ali Veli");
        assert_eq!(c.phone, "05321234567");

        let c = heuristic_candidate("Benim adım Ayşe Yılmaz, numaram 0532 123 45 67", &gate)
            .unwrap();
        assert_eq!(c.name, "Ayşe Yılmaz");

        let c = heuristic_candidate("ali veli 05321234567", &gate).unwrap();
        assert_eq!(c.name, "ali veli");
    }

    #[test]
    fn test_heuristic_requires_phone_and_name() {
        let gate = PhoneGate::default();
        assert!(heuristic_candidate("Ali Veli", &gate).is_none());
        assert!(heuristic_candidate("05321234567", &gate).is_none());
    }
}
