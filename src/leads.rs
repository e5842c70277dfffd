//! Lead extraction and recording.
//!
//! [`LeadExtractor`] finds a name and phone in a message. The gated path
//! ([`LeadExtractor::try_extract`]) runs the phone regex first and never
//! calls the collaborator when it fails; the ungated path
//! ([`LeadExtractor::extract_contact`]) is used when the conversation is
//! already waiting for contact details.
//!
//! [`LeadRecorder`] appends a captured lead to every configured sink and
//! sends the optional notification. Both are best-effort: failures are
//! logged and reflected in the returned [`LeadCapture`], never raised.

use catalog_assistant_core::lead::{decode_extraction, Extraction, PhoneGate};
use catalog_assistant_core::models::{LeadCandidate, LeadRecord};
use serde::Serialize;
use std::sync::Arc;

use crate::traits::{LeadNotifier, LeadSink, TextExtractor};

/// Instruction sent to the text-understanding collaborator.
pub const EXTRACTION_INSTRUCTION: &str = "Extract the customer's full name and phone number \
from the message. Respond with a single JSON object and nothing else: \
{\"name\": \"<full name>\", \"phone\": \"<phone number as written>\"}. \
If either value is missing, respond with {\"found\": false, \"name\": null, \"phone\": null}.";

pub struct LeadExtractor {
    gate: PhoneGate,
    extractor: Arc<dyn TextExtractor>,
}

impl LeadExtractor {
    pub fn new(gate: PhoneGate, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { gate, extractor }
    }

    pub fn gate(&self) -> &PhoneGate {
        &self.gate
    }

    /// Extract a lead from a message that may contain one. Messages without
    /// a phone-shaped substring return `None` without calling the
    /// collaborator.
    pub async fn try_extract(&self, text: &str) -> Option<LeadCandidate> {
        if !self.gate.is_match(text) {
            return None;
        }
        self.extract_contact(text).await
    }

    /// Extract a lead without the phone gate. Any collaborator or decode
    /// failure is `None`.
    pub async fn extract_contact(&self, text: &str) -> Option<LeadCandidate> {
        if text.trim().is_empty() {
            return None;
        }

        let raw = match self.extractor.extract(EXTRACTION_INSTRUCTION, text).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    extractor = self.extractor.name(),
                    error = %e,
                    "lead extraction call failed"
                );
                return None;
            }
        };

        match decode_extraction(&raw) {
            Ok(Extraction::Found(candidate)) => Some(candidate),
            Ok(Extraction::NotFound) => {
                tracing::debug!("no lead in message");
                None
            }
            Err(e) => {
                tracing::warn!(
                    extractor = self.extractor.name(),
                    error = %e,
                    "discarding unparseable extraction output"
                );
                None
            }
        }
    }
}

/// Result of one capture attempt, as reported to callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadCapture {
    /// A lead was found and at least one sink accepted it.
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sinks that accepted the record.
    pub persisted: usize,
    pub notified: bool,
}

impl LeadCapture {
    pub fn not_saved() -> Self {
        Self::default()
    }
}

pub struct LeadRecorder {
    sinks: Vec<Arc<dyn LeadSink>>,
    notifier: Option<Arc<dyn LeadNotifier>>,
}

impl LeadRecorder {
    pub fn new(sinks: Vec<Arc<dyn LeadSink>>, notifier: Option<Arc<dyn LeadNotifier>>) -> Self {
        Self { sinks, notifier }
    }

    /// Append `record` to every sink once and notify once.
    pub async fn record(&self, record: &LeadRecord) -> LeadCapture {
        let mut persisted = 0;
        for sink in &self.sinks {
            match sink.append(record).await {
                Ok(()) => persisted += 1,
                Err(e) => tracing::warn!(
                    sink = sink.name(),
                    lead_id = %record.id,
                    error = %e,
                    "lead sink append failed"
                ),
            }
        }

        let notified = match &self.notifier {
            Some(notifier) => match notifier.notify(record).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(lead_id = %record.id, error = %e, "lead notification failed");
                    false
                }
            },
            None => false,
        };

        tracing::info!(
            lead_id = %record.id,
            name = %record.name,
            persisted,
            notified,
            product_query = record.associated_product_query.as_deref().unwrap_or(""),
            "lead captured"
        );

        LeadCapture {
            saved: persisted > 0,
            name: Some(record.name.clone()),
            persisted,
            notified,
        }
    }
}
