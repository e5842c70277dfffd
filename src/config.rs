//! Configuration parsing and validation.
//!
//! The service reads a single TOML file (default `./config/assistant.toml`).
//! Only `[server]` is required; every other section falls back to defaults
//! that run fully offline (`llm.provider = "disabled"`).
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3000"
//!
//! [catalog]
//! path = "data/products.json"
//! base_url = "https://www.example.com/arama"
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! ```
//!
//! Secrets are never stored in the file. `llm.api_key_env` and
//! `leads.email.password_env` name the environment variables to read.
//!
//! The matching vocabulary is a separate document; see [`load_vocabulary`].

use anyhow::{Context, Result};
use catalog_assistant_core::lead::PhoneGate;
use catalog_assistant_core::search::SearchParams;
use catalog_assistant_core::vocabulary::Vocabulary;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Vocabulary compiled into the binary, used unless
/// `[matching].vocabulary` points elsewhere.
pub const BUILTIN_VOCABULARY: &str = include_str!("../config/vocabulary.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub leads: LeadsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Local catalog JSON. Required at startup.
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    /// Optional remote copy of the catalog, preferred when reachable.
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Storefront search page used for product deep links.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            remote_url: None,
            base_url: None,
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/products.json")
}
fn default_remote_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// Vocabulary override file. The built-in vocabulary is used when unset.
    #[serde(default)]
    pub vocabulary: Option<PathBuf>,
    /// Phone gate regex. Defaults to Turkish mobile numbers.
    #[serde(default)]
    pub phone_pattern: Option<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            fuzzy_threshold: default_fuzzy_threshold(),
            vocabulary: None,
            phone_pattern: None,
        }
    }
}

impl MatchingConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            max_results: self.max_results,
            fuzzy_threshold: self.fuzzy_threshold,
        }
    }

    pub fn phone_gate(&self) -> Result<PhoneGate> {
        match &self.phone_pattern {
            Some(pattern) => PhoneGate::new(pattern),
            None => Ok(PhoneGate::default()),
        }
    }
}

fn default_max_results() -> usize {
    10
}
fn default_fuzzy_threshold() -> f64 {
    0.35
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    /// Seconds a session may wait for contact details before it reverts
    /// to normal.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: default_pending_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_pending_ttl_secs() -> u64 {
    1800
}
fn default_sweep_interval_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// API root, for proxies and tests. Provider default when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Provider default when unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(name), _) => name,
            (None, "anthropic") => "ANTHROPIC_API_KEY",
            (None, "gemini") => "GEMINI_API_KEY",
            (None, _) => "OPENAI_API_KEY",
        }
    }

    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let name = self.key_env();
        std::env::var(name)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("{} environment variable not set", name))
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}

/// Persona and canned texts. `{name}` in `thank_you` is replaced with the
/// captured name.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Reply with `contact_request` directly on a miss instead of asking
    /// the reply generator to phrase it.
    #[serde(default)]
    pub ask_contact_directly: bool,
    #[serde(default = "default_contact_request")]
    pub contact_request: String,
    #[serde(default = "default_thank_you")]
    pub thank_you: String,
    #[serde(default = "default_apology")]
    pub apology: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Most recent messages forwarded to the reply generator.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            ask_contact_directly: false,
            contact_request: default_contact_request(),
            thank_you: default_thank_you(),
            apology: default_apology(),
            greeting: default_greeting(),
            history_limit: default_history_limit(),
        }
    }
}

impl AssistantConfig {
    pub fn thank_you_for(&self, name: &str) -> String {
        self.thank_you.replace("{name}", name)
    }
}

fn default_persona() -> String {
    "You are the technical sales assistant of a nanomaterials supplier. \
     Recommend the catalog products that best fit the customer's project, \
     with price and stock when known. Only use product data given to you \
     in the context. When you name a product, link it as \
     <a href=\"LINK\" target=\"_blank\">PRODUCT NAME</a>."
        .to_string()
}
fn default_contact_request() -> String {
    "We could not find that product in our catalog. So that we can prepare \
     a custom offer, could you please write your name, surname and phone \
     number?"
        .to_string()
}
fn default_thank_you() -> String {
    "Thank you {name}, we have your details. A sales representative will \
     get back to you shortly."
        .to_string()
}
fn default_apology() -> String {
    "Sorry, I cannot answer right now. Please try again in a moment or \
     leave your name and phone number and we will call you back."
        .to_string()
}
fn default_greeting() -> String {
    "Hello! Tell me which material or application you are interested in \
     and I will find the matching products."
        .to_string()
}
fn default_history_limit() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeadsConfig {
    /// JSON Lines file that every captured lead is appended to.
    #[serde(default = "default_leads_path")]
    pub path: PathBuf,
    /// Spreadsheet append endpoint that receives each lead as JSON.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            path: default_leads_path(),
            webhook_url: None,
            email: None,
        }
    }
}

fn default_leads_path() -> PathBuf {
    PathBuf::from("leads/leads.jsonl")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Sender address; the username when unset.
    #[serde(default)]
    pub from: Option<String>,
    pub to: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_smtp_port() -> u16 {
    587
}
fn default_password_env() -> String {
    "SMTP_PASSWORD".to_string()
}
fn default_subject() -> String {
    "New sales lead".to_string()
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.matching.max_results == 0 {
        anyhow::bail!("matching.max_results must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.matching.fuzzy_threshold) {
        anyhow::bail!("matching.fuzzy_threshold must be in [0.0, 1.0]");
    }

    if let Some(pattern) = &config.matching.phone_pattern {
        PhoneGate::new(pattern).context("matching.phone_pattern is invalid")?;
    }

    if config.sessions.pending_ttl_secs == 0 {
        anyhow::bail!("sessions.pending_ttl_secs must be > 0");
    }

    if config.sessions.sweep_interval_secs == 0 {
        anyhow::bail!("sessions.sweep_interval_secs must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "anthropic" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, anthropic, or gemini.",
            other
        ),
    }

    if config.llm.provider == "anthropic" && config.llm.model.is_none() {
        anyhow::bail!("llm.model must be specified when provider is 'anthropic'");
    }

    if let Some(email) = &config.leads.email {
        if email.to.is_empty() {
            anyhow::bail!("leads.email.to must list at least one recipient");
        }
        if email.smtp_host.trim().is_empty() {
            anyhow::bail!("leads.email.smtp_host must not be empty");
        }
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load the matching vocabulary: the override file when configured,
/// otherwise [`BUILTIN_VOCABULARY`].
pub fn load_vocabulary(matching: &MatchingConfig) -> Result<Vocabulary> {
    let (content, origin) = match &matching.vocabulary {
        Some(path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read vocabulary file: {}", path.display()))?,
            path.display().to_string(),
        ),
        None => (BUILTIN_VOCABULARY.to_string(), "built-in".to_string()),
    };

    let vocabulary: Vocabulary = toml::from_str(&content)
        .with_context(|| format!("Failed to parse vocabulary ({})", origin))?;
    vocabulary
        .validated()
        .with_context(|| format!("Invalid vocabulary ({})", origin))
}
