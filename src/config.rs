//! Runtime configuration, read from the environment.

use anyhow::{Context, Result};

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:7777";
pub const DEFAULT_MAILGUN_DOMAIN: &str = "mail.sickfits.com";
pub const DEFAULT_PORT: u16 = 4444;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string
    pub database_url: String,
    /// The secret used to sign login tokens
    pub app_secret: String,
    /// The secret API key for Stripe
    pub stripe_secret: String,
    /// The API key for sending emails through Mailgun
    pub mailgun_token: String,
    pub mailgun_domain: String,
    /// Where the storefront lives, for CORS and links in emails
    pub frontend_url: String,
    pub port: u16,
}

impl Config {
    /// Loads the config, reading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            app_secret: required("APP_SECRET")?,
            stripe_secret: required("STRIPE_SECRET")?,
            mailgun_token: required("MAILGUN_TOKEN")?,
            mailgun_domain: optional("MAILGUN_DOMAIN")
                .unwrap_or_else(|| DEFAULT_MAILGUN_DOMAIN.to_owned()),
            frontend_url: optional("FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_owned()),
            port: optional("PORT")
                .map(|port| port.parse().context("`PORT` must be a port number"))
                .transpose()?
                .unwrap_or(DEFAULT_PORT),
        })
    }

    pub fn reset_link(&self, reset_token: &str) -> String {
        format!("{}/reset?resetToken={}", self.frontend_url, reset_token)
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("`{name}` not set"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
