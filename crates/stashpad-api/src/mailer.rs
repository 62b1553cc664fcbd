//! Transactional email over a Brevo-compatible HTTP API.
//!
//! Delivery is best-effort: callers log failures and carry on, so a broken
//! mail provider never blocks sign-up or password reset.

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub sender: String,
    pub api_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    text_content: &'a str,
}

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: Option<MailConfig>,
}

impl Mailer {
    pub fn new(config: Option<MailConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Mailer that only logs what it would have sent.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let Some(config) = &self.config else {
            info!("Mail not configured; would send {:?} to {}", subject, to);
            return Ok(());
        };

        let body = serde_json::to_string(&SendEmailBody {
            sender: EmailAddress { email: &config.sender },
            to: vec![EmailAddress { email: to }],
            subject,
            text_content: text,
        })?;

        let resp = self
            .client
            .post(&config.api_url)
            .header("api-key", &config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            info!("Sent {:?} to {}", subject, to);
            return Ok(());
        }
        let detail = resp.text().await.unwrap_or_default();
        bail!("mail send failed (status={status}): {detail}")
    }

    /// [`Mailer::send`] that logs instead of failing.
    pub async fn send_best_effort(&self, to: &str, subject: &str, text: &str) {
        if let Err(e) = self.send(to, subject, text).await {
            warn!("Could not send {:?} to {}: {}", subject, to, e);
        }
    }
}
