//! Conversation orchestration.
//!
//! [`Assistant::respond`] handles one chat turn:
//!
//! 1. If the session is waiting for contact details, run the contact
//!    extractor (no phone gate). On success record the lead with the
//!    pending query, clear the session, and thank the user.
//! 2. Otherwise try unprompted lead capture through the phone gate.
//! 3. Search the catalog. Matches become a context block with deep links.
//!    A product-seeking message with no match moves the session to
//!    awaiting-contact and asks for details, directly or through the
//!    context. While a session is pending, a message carrying phone digits
//!    that failed extraction keeps the earlier pending query.
//! 4. Generate the reply (apology on failure) and wrap matched product
//!    names in anchor links.
//!
//! The session lock is held for the whole turn.

use anyhow::{bail, Result};
use catalog_assistant_core::lead::PhoneGate;
use catalog_assistant_core::links::{anchor, annotate_links, product_link};
use catalog_assistant_core::models::{ChatMessage, LeadRecord, Role};
use catalog_assistant_core::search::{MatchEngine, ProductMatch};
use catalog_assistant_core::session::memory::InMemorySessionStore;
use catalog_assistant_core::session::{SessionStore, DEFAULT_SESSION_ID};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::CatalogStore;
use crate::config::{load_vocabulary, AssistantConfig, Config};
use crate::leads::{LeadCapture, LeadExtractor, LeadRecorder};
use crate::llm::{create_reply_generator, create_text_extractor};
use crate::notify::SmtpNotifier;
use crate::sessions::SessionTracker;
use crate::sinks::create_sinks;
use crate::traits::{
    ContextProduct, LeadNotifier, LeadSink, ReplyContext, ReplyGenerator, ReplyRequest,
    TextExtractor,
};

const DEFAULT_CURRENCY: &str = "TL";

/// External backends the assistant depends on.
pub struct Collaborators {
    pub replies: Arc<dyn ReplyGenerator>,
    pub extractor: Arc<dyn TextExtractor>,
    pub sinks: Vec<Arc<dyn LeadSink>>,
    pub notifier: Option<Arc<dyn LeadNotifier>>,
    pub sessions: Arc<dyn SessionStore>,
}

/// What one turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub message: String,
    pub lead: LeadCapture,
    pub matches: usize,
    /// The session is waiting for contact details after this turn.
    pub awaiting_contact: bool,
}

pub struct Assistant {
    catalog: Arc<CatalogStore>,
    sessions: Arc<SessionTracker>,
    leads: LeadExtractor,
    recorder: LeadRecorder,
    replies: Arc<dyn ReplyGenerator>,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(
        catalog: Arc<CatalogStore>,
        gate: PhoneGate,
        collaborators: Collaborators,
        config: AssistantConfig,
        pending_ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            sessions: Arc::new(SessionTracker::new(collaborators.sessions, pending_ttl)),
            leads: LeadExtractor::new(gate, collaborators.extractor),
            recorder: LeadRecorder::new(collaborators.sinks, collaborators.notifier),
            replies: collaborators.replies,
            config,
        }
    }

    /// Wire up every component from configuration. Fails when the catalog
    /// file, the vocabulary, or a configured backend cannot be set up.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let vocabulary = load_vocabulary(&config.matching)?;
        let engine = Arc::new(MatchEngine::new(
            &vocabulary,
            config.matching.search_params(),
        ));
        let catalog = Arc::new(CatalogStore::load(&config.catalog, engine).await?);
        let gate = config.matching.phone_gate()?;

        let notifier: Option<Arc<dyn LeadNotifier>> = match &config.leads.email {
            Some(email) => Some(Arc::new(SmtpNotifier::new(email)?)),
            None => None,
        };

        let collaborators = Collaborators {
            replies: create_reply_generator(&config.llm, &config.assistant)?,
            extractor: create_text_extractor(&config.llm, &gate)?,
            sinks: create_sinks(&config.leads)?,
            notifier,
            sessions: Arc::new(InMemorySessionStore::new()),
        };

        tracing::info!(
            provider = %config.llm.provider,
            products = catalog.len(),
            sinks = collaborators.sinks.len(),
            email = collaborators.notifier.is_some(),
            "assistant ready"
        );

        Ok(Self::new(
            catalog,
            gate,
            collaborators,
            config.assistant.clone(),
            Duration::from_secs(config.sessions.pending_ttl_secs),
        ))
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.sessions
    }

    pub fn lead_extractor(&self) -> &LeadExtractor {
        &self.leads
    }

    /// Answer the last message of `messages`.
    ///
    /// Errors only on an empty message list or an empty last message.
    /// Collaborator failures degrade the reply instead.
    #[tracing::instrument(skip_all, fields(session = tracing::field::Empty))]
    pub async fn respond(
        &self,
        messages: &[ChatMessage],
        session_id: Option<&str>,
    ) -> Result<TurnOutcome> {
        let Some(last) = messages.last() else {
            bail!("messages must not be empty");
        };
        let text = last.content.trim();
        if text.is_empty() {
            bail!("last message must not be empty");
        }

        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID);
        tracing::Span::current().record("session", session_id);

        let _turn = self.sessions.lock(session_id).await;

        let pending = match self.sessions.pending(session_id).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed, treating as normal");
                None
            }
        };
        let was_pending = pending.is_some();

        // 1 + 2: contact capture.
        let candidate = if was_pending {
            self.leads.extract_contact(text).await
        } else {
            self.leads.try_extract(text).await
        };
        if let Some(candidate) = candidate {
            let associated = pending.and_then(|s| s.pending_product_query);
            let record = LeadRecord::new(
                candidate,
                &last.content,
                associated,
                Some(session_id.to_string()),
                Utc::now(),
            );
            let lead = self.recorder.record(&record).await;
            if was_pending {
                if let Err(e) = self.sessions.clear(session_id).await {
                    tracing::warn!(error = %e, "failed to clear session after capture");
                }
            }
            return Ok(TurnOutcome {
                message: self.config.thank_you_for(&record.name),
                lead,
                matches: 0,
                awaiting_contact: false,
            });
        }

        // 3: search.
        let engine = self.catalog.engine().clone();
        let snapshot = self.catalog.snapshot();
        let product_seeking = !engine.normalizer().analyze(text).is_empty();
        let matches = engine.search(text, &snapshot);
        tracing::debug!(
            matches = matches.len(),
            product_seeking,
            top = matches.first().map(|m| m.product.name.as_str()).unwrap_or(""),
            "catalog search"
        );

        let mut awaiting_contact = was_pending;
        let context = if !matches.is_empty() {
            ReplyContext::ProductsFound(self.context_products(&matches))
        } else if product_seeking {
            if was_pending && self.leads.gate().mentions_phone(text) {
                // An incomplete contact reply, not a new product query.
                tracing::debug!("contact details incomplete, pending query kept");
            } else {
                match self.sessions.mark_awaiting_contact(session_id, text).await {
                    Ok(()) => awaiting_contact = true,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to mark session awaiting contact")
                    }
                }
            }
            if self.config.ask_contact_directly {
                return Ok(TurnOutcome {
                    message: self.config.contact_request.clone(),
                    lead: LeadCapture::not_saved(),
                    matches: 0,
                    awaiting_contact,
                });
            }
            ReplyContext::NoMatch {
                query: text.to_string(),
            }
        } else {
            ReplyContext::General
        };

        // 4: reply + links.
        let request = ReplyRequest {
            instruction: format!("{}\n\n{}", self.config.persona, render_context(&context)),
            context,
            history: self.history(messages),
        };
        let reply = match self.replies.generate(&request).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                tracing::warn!(generator = self.replies.name(), "empty reply");
                self.config.apology.clone()
            }
            Err(e) => {
                tracing::warn!(generator = self.replies.name(), error = %e, "reply generation failed");
                self.config.apology.clone()
            }
        };

        let links = self.links(&matches);
        let message = if links.is_empty() {
            reply
        } else {
            annotate_links(&reply, &links)
        };

        Ok(TurnOutcome {
            message,
            lead: LeadCapture::not_saved(),
            matches: matches.len(),
            awaiting_contact,
        })
    }

    fn history(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let turns: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
            .collect();
        let skip = turns.len().saturating_sub(self.config.history_limit.max(1));
        turns.into_iter().skip(skip).cloned().collect()
    }

    fn links(&self, matches: &[ProductMatch]) -> Vec<(String, String)> {
        matches
            .iter()
            .filter_map(|m| {
                product_link(&m.product, self.catalog.base_url()).map(|l| (m.product.name.clone(), l))
            })
            .collect()
    }

    fn context_products(&self, matches: &[ProductMatch]) -> Vec<ContextProduct> {
        matches
            .iter()
            .map(|m| {
                let p = &m.product;
                ContextProduct {
                    name: p.name.clone(),
                    link: product_link(p, self.catalog.base_url()),
                    price: p.price.clone().filter(|s| !s.trim().is_empty()),
                    currency: p
                        .currency
                        .clone()
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                    stock_status: p.stock_status.clone().filter(|s| !s.trim().is_empty()),
                    category: p.category.clone().filter(|s| !s.trim().is_empty()),
                    description: p.description.clone().filter(|s| !s.trim().is_empty()),
                }
            })
            .collect()
    }
}

/// The context block appended to the persona.
pub fn render_context(context: &ReplyContext) -> String {
    match context {
        ReplyContext::ProductsFound(products) => {
            let blocks: Vec<String> = products.iter().map(render_product).collect();
            format!(
                "CONTEXT: Matching products were found. Use the HTML links when you mention them.\n{}",
                blocks.join("\n---\n")
            )
        }
        ReplyContext::NoMatch { .. } => "CONTEXT: The requested product was not found in the \
             catalog. Ask the customer for their name, surname and phone number so that sales \
             can prepare a custom offer."
            .to_string(),
        ReplyContext::General => "CONTEXT: No specific product was asked about. Answer briefly \
             and invite the customer to name the material or application they need."
            .to_string(),
    }
}

fn render_product(p: &ContextProduct) -> String {
    let mut lines = vec![match &p.link {
        Some(href) => format!("PRODUCT: {}", anchor(href, &p.name)),
        None => format!("PRODUCT: {}", p.name),
    }];
    if let Some(price) = &p.price {
        lines.push(format!("PRICE: {} {}", price, p.currency));
    }
    if let Some(stock) = &p.stock_status {
        lines.push(format!("STOCK: {}", stock));
    }
    if let Some(category) = &p.category {
        lines.push(format!("CATEGORY: {}", category));
    }
    if let Some(description) = &p.description {
        lines.push(format!("DESCRIPTION: {}", description));
    }
    lines.join("\n")
}
