//! LLM-backed and offline collaborators.
//!
//! - **[`OpenAiClient`]** calls `POST {base}/chat/completions`. Extraction
//!   uses JSON mode (`response_format: json_object`).
//! - **[`AnthropicClient`]** calls `POST {base}/messages`.
//! - **[`GeminiClient`]** calls `POST {base}/models/{model}:generateContent`.
//!   Extraction asks for `application/json` output.
//! - **[`TemplateReplies`]** and **[`HeuristicExtractor`]** run without a
//!   network, for `llm.provider = "disabled"`.
//!
//! Calls are never retried. A failure surfaces as an `Err` and the
//! orchestrator degrades the reply.
//!
//! Use [`create_reply_generator`] and [`create_text_extractor`] to build
//! the backends named in the configuration.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use catalog_assistant_core::lead::{heuristic_candidate, PhoneGate};
use catalog_assistant_core::links::anchor;
use catalog_assistant_core::models::{ChatMessage, Role};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AssistantConfig, LlmConfig};
use crate::traits::{ReplyContext, ReplyGenerator, ReplyRequest, TextExtractor};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn base_url(config: &LlmConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

async fn post_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, body_text);
    }
    Ok(response.json().await?)
}

// ============ OpenAI ============

/// Chat completions client. Requires the API key named by
/// `llm.api_key_env` (default `OPENAI_API_KEY`).
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url(config, OPENAI_BASE_URL),
            api_key: config.api_key()?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn complete(&self, body: Value) -> Result<String> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        let json = post_json(request, "OpenAI").await?;
        parse_openai_content(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_openai_content(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing message content"))
}

fn openai_messages(request: &ReplyRequest) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": request.instruction})];
    messages.extend(
        request
            .history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({"role": m.role, "content": m.content})),
    );
    messages
}

#[async_trait]
impl ReplyGenerator for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        self.complete(json!({
            "model": self.model,
            "messages": openai_messages(request),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        }))
        .await
    }
}

#[async_trait]
impl TextExtractor for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(&self, instruction: &str, text: &str) -> Result<String> {
        self.complete(json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": instruction},
                {"role": "user", "content": text},
            ],
            "temperature": 0.0,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
        }))
        .await
    }
}

// ============ Anthropic ============

/// Messages API client. Requires `llm.model` and the API key named by
/// `llm.api_key_env` (default `ANTHROPIC_API_KEY`).
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for Anthropic provider"))?;
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url(config, ANTHROPIC_BASE_URL),
            api_key: config.api_key()?,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, system: &str, messages: Vec<Value>, temperature: f32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": temperature,
            "system": system,
            "messages": messages,
        });
        let request = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let json = post_json(request, "Anthropic").await?;
        parse_anthropic_content(&json)
    }
}

/// Concatenate the `text` blocks of a messages API response.
fn parse_anthropic_content(json: &Value) -> Result<String> {
    let blocks = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid Anthropic response: missing content"))?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        bail!("Invalid Anthropic response: no text content");
    }
    Ok(text)
}

/// The messages API wants user/assistant turns starting with a user turn.
fn anthropic_messages(history: &[ChatMessage]) -> Vec<Value> {
    history
        .iter()
        .filter(|m| m.role != Role::System)
        .skip_while(|m| m.role != Role::User)
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect()
}

#[async_trait]
impl ReplyGenerator for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        let messages = anthropic_messages(&request.history);
        if messages.is_empty() {
            bail!("no user message to answer");
        }
        self.send(&request.instruction, messages, self.temperature)
            .await
    }
}

#[async_trait]
impl TextExtractor for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn extract(&self, instruction: &str, text: &str) -> Result<String> {
        self.send(
            instruction,
            vec![json!({"role": "user", "content": text})],
            0.0,
        )
        .await
    }
}

// ============ Gemini ============

/// `generateContent` client. Requires the API key named by
/// `llm.api_key_env` (default `GEMINI_API_KEY`).
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url(config, GEMINI_BASE_URL),
            api_key: config.api_key()?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn generate_content(
        &self,
        system: &str,
        contents: Vec<Value>,
        generation_config: Value,
    ) -> Result<String> {
        let body = json!({
            "contents": contents,
            "systemInstruction": {"parts": [{"text": system}]},
            "generationConfig": generation_config,
        });
        let request = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let json = post_json(request, "Gemini").await?;
        parse_gemini_content(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_content(json: &Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidate content"))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        bail!("Invalid Gemini response: no text content");
    }
    Ok(text)
}

/// Gemini names the assistant role `model` and wants a user turn first.
fn gemini_contents(history: &[ChatMessage]) -> Vec<Value> {
    history
        .iter()
        .filter(|m| m.role != Role::System)
        .skip_while(|m| m.role != Role::User)
        .map(|m| {
            let role = if m.role == Role::Assistant { "model" } else { "user" };
            json!({"role": role, "parts": [{"text": m.content}]})
        })
        .collect()
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        let contents = gemini_contents(&request.history);
        if contents.is_empty() {
            bail!("no user message to answer");
        }
        self.generate_content(
            &request.instruction,
            contents,
            json!({"temperature": self.temperature, "maxOutputTokens": self.max_tokens}),
        )
        .await
    }
}

#[async_trait]
impl TextExtractor for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, instruction: &str, text: &str) -> Result<String> {
        self.generate_content(
            instruction,
            vec![json!({"role": "user", "parts": [{"text": text}]})],
            json!({
                "temperature": 0.0,
                "maxOutputTokens": self.max_tokens,
                "responseMimeType": "application/json",
            }),
        )
        .await
    }
}

// ============ Offline ============

/// Reply generator that fills canned texts from the turn's context.
pub struct TemplateReplies {
    assistant: AssistantConfig,
}

impl TemplateReplies {
    pub fn new(assistant: &AssistantConfig) -> Self {
        Self {
            assistant: assistant.clone(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for TemplateReplies {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        Ok(match &request.context {
            ReplyContext::ProductsFound(products) => {
                let mut lines = vec!["These products match your request:".to_string()];
                for p in products {
                    let mut line = match &p.link {
                        Some(href) => format!("- {}", anchor(href, &p.name)),
                        None => format!("- {}", p.name),
                    };
                    if let Some(price) = &p.price {
                        line.push_str(&format!(", {} {}", price, p.currency));
                    }
                    if let Some(stock) = &p.stock_status {
                        line.push_str(&format!(" ({})", stock));
                    }
                    lines.push(line);
                }
                lines.join("\n")
            }
            ReplyContext::NoMatch { .. } => self.assistant.contact_request.clone(),
            ReplyContext::General => self.assistant.greeting.clone(),
        })
    }
}

/// Extractor that answers with the regex phone and the most name-like
/// words, in the same JSON shape an LLM is asked for.
pub struct HeuristicExtractor {
    gate: PhoneGate,
}

impl HeuristicExtractor {
    pub fn new(gate: PhoneGate) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl TextExtractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn extract(&self, _instruction: &str, text: &str) -> Result<String> {
        Ok(match heuristic_candidate(text, &self.gate) {
            Some(c) => json!({"name": c.name, "phone": c.phone}),
            None => json!({"found": false, "name": null, "phone": null}),
        }
        .to_string())
    }
}

// ============ Factories ============

/// Build the reply generator for `llm.provider`.
pub fn create_reply_generator(
    config: &LlmConfig,
    assistant: &AssistantConfig,
) -> Result<Arc<dyn ReplyGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(TemplateReplies::new(assistant))),
        "openai" => Ok(Arc::new(OpenAiClient::new(config)?)),
        "anthropic" => Ok(Arc::new(AnthropicClient::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// Build the text extractor for `llm.provider`.
pub fn create_text_extractor(
    config: &LlmConfig,
    gate: &PhoneGate,
) -> Result<Arc<dyn TextExtractor>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(HeuristicExtractor::new(gate.clone()))),
        "openai" => Ok(Arc::new(OpenAiClient::new(config)?)),
        "anthropic" => Ok(Arc::new(AnthropicClient::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
