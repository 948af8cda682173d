//! Sending transactional emails through Mailgun.

use askama::Template;
use async_trait::async_trait;

use crate::error::{ShopError, ShopResult};

pub mod reset_password;

pub const MAILGUN_API_URL: &str = "https://api.mailgun.net/v3";
pub const SENDER_NAME: &str = "Sick Fits";

pub trait Email: Template {
    fn subject(&self) -> String;
    fn address(&self) -> String;
}

/// An email ready to hand to a [Mailer].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl OutgoingEmail {
    pub fn render(email: &impl Email) -> ShopResult<Self> {
        Ok(Self {
            to: email.address(),
            subject: email.subject(),
            html: email
                .render()
                .map_err(|err| ShopError::Email(err.to_string()))?,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> ShopResult<()>;
}

pub struct MailgunMailer {
    client: reqwest::Client,
    token: String,
    domain: String,
}

impl MailgunMailer {
    pub fn new(token: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            domain: domain.into(),
        }
    }

    fn sender(&self) -> String {
        format!("{} <mail@{}>", SENDER_NAME, self.domain)
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, email: OutgoingEmail) -> ShopResult<()> {
        let url = format!("{}/{}/messages", MAILGUN_API_URL, self.domain);
        let sender = self.sender();
        let form = [
            ("from", sender.as_str()),
            ("to", email.to.as_str()),
            ("subject", email.subject.as_str()),
            ("html", email.html.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .basic_auth("api", Some(&self.token))
            .form(&form)
            .send()
            .await
            .map_err(|source| ShopError::Upstream {
                service: "Mailgun",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopError::Email(format!(
                "Mailgun responded with status {status}: {body}"
            )));
        }

        tracing::info!(subject = %email.subject, "email sent");
        Ok(())
    }
}

pub async fn send_email(email: impl Email, mailer: &dyn Mailer) -> ShopResult<()> {
    mailer.send(OutgoingEmail::render(&email)?).await
}
