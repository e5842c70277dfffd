//! Collaborator traits.
//!
//! The conversation pipeline talks to the outside world only through these
//! traits, so each backend can be swapped (or mocked in tests) without
//! touching the orchestration logic.
//!
//! ```text
//!                 ┌─────────────────┐
//!   user turn ──▶ │    Assistant    │ ──▶ reply
//!                 └──┬───┬───┬───┬──┘
//!                    │   │   │   │
//!      ReplyGenerator│   │   │   │LeadNotifier
//!        TextExtractor   │   LeadSink
//!                  SessionStore (core)
//! ```
//!
//! | Trait | Implementations |
//! |-------|-----------------|
//! | [`ReplyGenerator`] | OpenAI, Anthropic, Gemini, offline templates ([`crate::llm`]) |
//! | [`TextExtractor`] | OpenAI and Gemini (JSON mode), Anthropic, offline heuristic |
//! | [`LeadSink`] | JSON Lines file, spreadsheet webhook ([`crate::sinks`]) |
//! | [`LeadNotifier`] | SMTP email ([`crate::notify`]) |

use anyhow::Result;
use async_trait::async_trait;
use catalog_assistant_core::models::{ChatMessage, LeadRecord};
use serde::Serialize;

/// One matched product as presented to the reply generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextProduct {
    pub name: String,
    pub link: Option<String>,
    pub price: Option<String>,
    pub currency: String,
    pub stock_status: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// What the orchestrator found for this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyContext {
    /// The search returned products, best first.
    ProductsFound(Vec<ContextProduct>),
    /// A product-seeking message with no catalog match. The reply should
    /// ask for contact details.
    NoMatch { query: String },
    /// Not a product question (greeting, small talk, empty query).
    General,
}

/// Input to a reply generator.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    /// Persona followed by the rendered context block.
    pub instruction: String,
    pub context: ReplyContext,
    /// Recent conversation, oldest first. Ends with the current user turn.
    pub history: Vec<ChatMessage>,
}

/// Phrases the assistant's reply.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Short backend name for logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    async fn generate(&self, request: &ReplyRequest) -> Result<String>;
}

/// Turns free text into structured JSON following an instruction.
///
/// The output is untrusted: it may be prose, malformed, or the wrong
/// shape. Callers decode it strictly.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, instruction: &str, text: &str) -> Result<String>;
}

/// Durable, append-only lead storage.
#[async_trait]
pub trait LeadSink: Send + Sync {
    fn name(&self) -> &str;

    async fn append(&self, record: &LeadRecord) -> Result<()>;
}

/// Out-of-band notification about a new lead.
#[async_trait]
pub trait LeadNotifier: Send + Sync {
    async fn notify(&self, record: &LeadRecord) -> Result<()>;
}
