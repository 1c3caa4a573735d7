//! Payment processor integration (Stripe).
//!
//! Creates payment intents and hands the client secret back to the caller.
//! Single attempt per request - failures are reported, not retried.

use crate::config::Config;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A created payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Payment errors
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment processor not configured")]
    NotConfigured,

    /// The processor refused the request; carries its message verbatim
    #[error("{0}")]
    Rejected(String),

    #[error("payment processor unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected payment processor response: {0}")]
    InvalidResponse(String),
}

/// Anything that can turn an amount into a payment intent
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create an intent for `amount` minor units of `currency`
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Whether requests can succeed at all
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Pull the human-readable message out of a Stripe error body
fn error_message(body: &str) -> Option<String> {
    let parsed: StripeErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .message
        .or(parsed.error.code)
        .filter(|m| !m.is_empty())
}

/// Stripe REST client
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: Option<String>,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client from configuration
    pub fn new(config: &Config) -> Result<Self, PaymentError> {
        if !config.payments_configured() {
            warn!("STRIPE_SECRET_KEY not set - payment intents disabled");
        }

        let http = reqwest::Client::builder()
            .timeout(config.payment_timeout)
            .build()?;

        Ok(Self {
            http,
            secret_key: config.stripe_secret_key.clone(),
            api_base: config.stripe_api_base.clone(),
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(PaymentError::NotConfigured)?;

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(secret_key)
            .form(&[("amount", amount.to_string()), ("currency", currency.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body)
                .unwrap_or_else(|| format!("payment processor returned {status}"));
            debug!(%status, "Payment intent rejected");
            return Err(PaymentError::Rejected(message));
        }

        let intent: StripePaymentIntent = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        let client_secret = intent
            .client_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::InvalidResponse("missing client_secret".to_string()))?;

        debug!(intent_id = %intent.id, "Created payment intent");

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
        })
    }

    fn is_enabled(&self) -> bool {
        self.secret_key.is_some()
    }
}

/// Create a shared Stripe client
pub fn create_client(config: &Config) -> Result<Arc<dyn PaymentProcessor>, PaymentError> {
    Ok(Arc::new(StripeClient::new(config)?))
}
