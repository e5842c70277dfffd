//! Email notification for new leads, sent over SMTP with STARTTLS.

use anyhow::{Context, Result};
use async_trait::async_trait;
use catalog_assistant_core::models::LeadRecord;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::config::EmailConfig;
use crate::traits::LeadNotifier;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject: String,
}

impl SmtpNotifier {
    /// Build the transport. The password is read from `password_env` now,
    /// so a missing secret fails at startup rather than on the first lead.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let password = std::env::var(&config.password_env).with_context(|| {
            format!("Email password env '{}' is not set", config.password_env)
        })?;

        let sender = config.from.as_deref().unwrap_or(&config.username);
        let from: Mailbox = sender
            .parse()
            .with_context(|| format!("Invalid sender email '{}'", sender))?;
        let to = config
            .to
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .with_context(|| format!("Invalid recipient email '{}'", addr))
            })
            .collect::<Result<Vec<_>>>()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .with_context(|| format!("Failed to initialize SMTP relay '{}'", config.smtp_host))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username.clone(), password))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            subject: config.subject.clone(),
        })
    }
}

/// Plain-text body of the notification email.
pub fn lead_email_body(record: &LeadRecord) -> String {
    let mut body = format!(
        "Name: {}\nPhone: {}\nTime: {}\n",
        record.name,
        record.phone,
        record.timestamp.to_rfc3339()
    );
    if let Some(query) = &record.associated_product_query {
        body.push_str(&format!("Requested product: {}\n", query));
    }
    body.push_str(&format!("\nMessage:\n{}\n", record.captured_from));
    body
}

#[async_trait]
impl LeadNotifier for SmtpNotifier {
    async fn notify(&self, record: &LeadRecord) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("{}: {}", self.subject, record.name));
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let message = builder
            .body(lead_email_body(record))
            .context("Failed to build email message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP send failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_assistant_core::models::LeadCandidate;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_email_body() {
        let record = LeadRecord::new(
            LeadCandidate::new("Ali Veli", "05321234567").unwrap(),
            "Ali Veli 05321234567",
            Some("Epoksi ile 600 derece".into()),
            None,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        );
        let body = lead_email_body(&record);
        assert!(body.starts_with("Name: Ali Veli\nPhone: 05321234567\nTime: 2024-05-01T09:30:00+00:00\n"));
        assert!(body.contains("Requested product: Epoksi ile 600 derece"));
        assert!(body.ends_with("Message:\nAli Veli 05321234567\n"));
    }

    #[test]
    fn test_missing_password_fails_fast() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: "bot@example.com".into(),
            password_env: "CATALOG_ASSISTANT_TEST_UNSET_SMTP".into(),
            from: None,
            to: vec!["sales@example.com".into()],
            subject: "New sales lead".into(),
        };
        assert!(SmtpNotifier::new(&config).is_err());
    }
}
