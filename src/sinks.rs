//! Lead sinks.
//!
//! - [`JsonlLeadSink`] appends one JSON object per line to a local file.
//! - [`WebhookLeadSink`] POSTs each record to a spreadsheet append endpoint.
//!
//! Delivery is at-least-once. Every record carries an `id` and a
//! `fingerprint` so downstream consumers can drop duplicates.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use catalog_assistant_core::models::LeadRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::LeadsConfig;
use crate::traits::LeadSink;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// The JSON Lines sink, plus the webhook sink when `leads.webhook_url` is set.
pub fn create_sinks(config: &LeadsConfig) -> Result<Vec<Arc<dyn LeadSink>>> {
    let mut sinks: Vec<Arc<dyn LeadSink>> = vec![Arc::new(JsonlLeadSink::new(&config.path))];
    if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        sinks.push(Arc::new(WebhookLeadSink::new(url, WEBHOOK_TIMEOUT)?));
    }
    Ok(sinks)
}

pub struct JsonlLeadSink {
    path: PathBuf,
    // Serializes appends so concurrent captures never interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlLeadSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LeadSink for JsonlLeadSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, record: &LeadRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open lead file: {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

pub struct WebhookLeadSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookLeadSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LeadSink for WebhookLeadSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn append(&self, record: &LeadRecord) -> Result<()> {
        let response = self.client.post(&self.url).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("lead webhook returned {}: {}", status, body_text);
        }
        Ok(())
    }
}
