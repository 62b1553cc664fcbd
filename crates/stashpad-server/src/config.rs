use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use stashpad_api::mailer::{DEFAULT_API_URL, MailConfig};
use stashpad_types::content::DEFAULT_PREVIEW_LENGTH;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub preview_length: usize,
    pub require_email_verification: bool,
    pub public_url: String,
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests need not touch the process env.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("STASHPAD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("STASHPAD_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let port: u16 = match var("STASHPAD_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("STASHPAD_PORT {raw:?} is not a port"))?,
            None => 3000,
        };
        let preview_length: usize = match var("STASHPAD_PREVIEW_LENGTH") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("STASHPAD_PREVIEW_LENGTH {raw:?} is not a number"))?,
            None => DEFAULT_PREVIEW_LENGTH,
        };
        let require_email_verification = match var("STASHPAD_REQUIRE_EMAIL_VERIFICATION") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("STASHPAD_REQUIRE_EMAIL_VERIFICATION {raw:?} is not a boolean"))?,
            None => true,
        };

        let mail = match (var("STASHPAD_MAIL_API_KEY"), var("STASHPAD_MAIL_SENDER")) {
            (Some(api_key), Some(sender)) => Some(MailConfig {
                api_key,
                sender,
                api_url: var("STASHPAD_MAIL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            host: var("STASHPAD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("STASHPAD_DB_PATH").unwrap_or_else(|| "stashpad.db".into()).into(),
            jwt_secret,
            preview_length,
            require_email_verification,
            public_url: var("STASHPAD_PUBLIC_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            mail,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
