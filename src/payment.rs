//! Capturing payments through Stripe.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{ShopError, ShopResult};

pub const STRIPE_CHARGES_URL: &str = "https://api.stripe.com/v1/charges";
pub const CURRENCY: &str = "USD";

/// A successful charge.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Charge {
    pub id: String,
    /// The amount captured in cents
    pub amount: i32,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` cents to the card behind the one-time `source` token.
    ///
    /// Repeating a charge with the same `idempotency_key` never captures twice.
    async fn charge(
        &self,
        amount: i32,
        currency: &str,
        source: &str,
        idempotency_key: &str,
    ) -> ShopResult<Charge>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    amount: i32,
    currency: &'a str,
    source: &'a str,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetails,
}

#[derive(Deserialize)]
struct StripeErrorDetails {
    message: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(
        &self,
        amount: i32,
        currency: &str,
        source: &str,
        idempotency_key: &str,
    ) -> ShopResult<Charge> {
        let response = self
            .client
            .post(STRIPE_CHARGES_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", idempotency_key)
            .form(&ChargeRequest {
                amount,
                currency: &currency.to_lowercase(),
                source,
            })
            .send()
            .await
            .map_err(|source| ShopError::Upstream {
                service: "Stripe",
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ShopError::Upstream {
            service: "Stripe",
            source,
        })?;

        let charge = parse_charge_response(status, &body)?;
        tracing::info!(charge = %charge.id, amount = charge.amount, "payment captured");

        Ok(charge)
    }
}

fn parse_charge_response(status: StatusCode, body: &str) -> ShopResult<Charge> {
    if status.is_success() {
        serde_json::from_str(body)
            .map_err(|err| ShopError::Payment(format!("unexpected response from Stripe: {err}")))
    } else {
        let message = serde_json::from_str::<StripeErrorBody>(body)
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| format!("Stripe responded with status {status}"));
        tracing::warn!(%status, %message, "payment declined");

        Err(ShopError::Payment(message))
    }
}
