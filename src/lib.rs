//! # Catalog Assistant
//!
//! A conversational sales-assistant backend. It receives chat turns,
//! matches them against a product catalog, asks for contact details when
//! nothing matches, and records leads (name + phone) captured from the
//! conversation.
//!
//! ## Architecture
//!
//! ```text
//!  POST /api/chat
//!        │
//!        ▼
//! ┌──────────────┐  pending?   ┌───────────────┐   ┌────────────┐
//! │  Assistant   │────────────▶│ LeadExtractor │──▶│LeadRecorder│──▶ JSONL / webhook / email
//! │ (per-session │             └───────────────┘   └────────────┘
//! │    lock)     │   search    ┌───────────────┐
//! │              │────────────▶│  MatchEngine  │◀── CatalogStore (Arc snapshot)
//! │              │             └───────────────┘
//! │              │   reply     ┌───────────────┐
//! │              │────────────▶│ReplyGenerator │──▶ link annotation ──▶ response
//! └──────────────┘             └───────────────┘
//! ```
//!
//! Pure matching and decoding logic lives in the `catalog-assistant-core`
//! crate; this crate adds configuration, I/O, and the HTTP/CLI surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and vocabulary loading |
//! | [`catalog`] | Catalog loading, remote fallback, hot reload |
//! | [`chat`] | Per-turn conversation orchestration |
//! | [`enrich`] | Batch catalog enrichment with checkpointing |
//! | [`leads`] | Lead extraction and best-effort recording |
//! | [`llm`] | OpenAI, Anthropic, Gemini, and offline collaborators |
//! | [`sessions`] | Session tracking with per-session locks and expiry |
//! | [`sinks`] | JSON Lines and webhook lead sinks |
//! | [`notify`] | SMTP lead notification |
//! | [`server`] | HTTP server |
//! | [`traits`] | Collaborator traits |

pub mod catalog;
pub mod chat;
pub mod config;
pub mod enrich;
pub mod extract;
pub mod leads;
pub mod llm;
pub mod notify;
pub mod search;
pub mod server;
pub mod sessions;
pub mod sinks;
pub mod traits;
