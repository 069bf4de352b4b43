//! Payment gateway clients.
//!
//! Checkout asks a [`PaymentGateway`] to open a payment; the customer pays
//! on the client; the gateway then tells us through a signed webhook (or,
//! for Curlec, a signed client callback). Only a verified
//! [`ConfirmedPayment`] ever turns a cart into an order.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::GatewayKind;
use crate::domain::value_objects::{Money, MoneyError};

pub mod curlec;
pub mod signature;
pub mod stripe;

pub use curlec::CurlecGateway;
pub use stripe::StripeGateway;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("payment not captured: {0}")]
    NotCaptured(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),
}

/// Checkout context carried through the gateway and back in the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub shipping_rate_id: Uuid,
}

impl PaymentMetadata {
    /// Parses metadata echoed back by a gateway, where every value is a string.
    pub fn from_strings(user_id: Option<&str>, address_id: Option<&str>, shipping_rate_id: Option<&str>) -> Result<Self, PaymentError> {
        let parse = |name: &str, v: Option<&str>| {
            v.and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| PaymentError::InvalidPayload(format!("missing or invalid metadata {name}")))
        };
        Ok(Self {
            user_id: parse("user_id", user_id)?,
            address_id: parse("address_id", address_id)?,
            shipping_rate_id: parse("shipping_rate_id", shipping_rate_id)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Money,
    pub receipt: String,
    pub customer_email: String,
    pub metadata: PaymentMetadata,
}

/// What the client needs to complete the payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub gateway: GatewayKind,
    /// Payment intent id (Stripe) or gateway order id (Curlec).
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Publishable key id the checkout widget needs (Curlec).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub amount: Decimal,
    pub amount_minor: i64,
    pub currency: String,
}

/// A payment the gateway has vouched for.
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub gateway: GatewayKind,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub metadata: PaymentMetadata,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError>;
}

/// Turns a non-success response into [`PaymentError::Api`], keeping the gateway's message.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().or(v["error"]["description"].as_str()).map(str::to_string))
        .unwrap_or(body);
    tracing::error!(status = status.as_u16(), %message, "Payment gateway request failed");
    Err(PaymentError::Api { status: status.as_u16(), message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_strings() {
        let id = Uuid::new_v4().to_string();
        let meta = PaymentMetadata::from_strings(Some(&id), Some(&id), Some(&id)).unwrap();
        assert_eq!(meta.user_id.to_string(), id);
        assert!(PaymentMetadata::from_strings(Some(&id), None, Some(&id)).is_err());
        assert!(PaymentMetadata::from_strings(Some("nope"), Some(&id), Some(&id)).is_err());
    }
}
