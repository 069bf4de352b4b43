//! Stripe Payment Intents client and webhook parsing.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::{check_response, signature, ConfirmedPayment, PaymentError, PaymentGateway, PaymentMetadata, PaymentRequest, PaymentSession};
use crate::config::StripeConfig;
use crate::domain::aggregates::GatewayKind;
use crate::domain::value_objects::Money;

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
}

/// Webhook events we act on.
#[derive(Debug, Clone)]
pub enum StripeEvent {
    Succeeded(ConfirmedPayment),
    Failed { intent_id: String, reason: Option<String> },
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    #[serde(default)]
    amount_received: i64,
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    last_payment_error: Option<LastError>,
}

#[derive(Debug, Deserialize)]
struct LastError {
    message: Option<String>,
}

impl StripeGateway {
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Verifies the `Stripe-Signature` header and parses the event.
    pub fn parse_webhook(&self, signature_header: &str, payload: &[u8], now_unix: i64) -> Result<StripeEvent, PaymentError> {
        signature::verify_stripe(signature_header, payload, self.webhook_secret.expose_secret(), now_unix)?;
        parse_event(payload)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn kind(&self) -> GatewayKind { GatewayKind::Stripe }

    #[instrument(skip(self, request), fields(receipt = %request.receipt))]
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let amount_minor = request.amount.to_minor_units()?;
        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&intent_form(request, amount_minor))
            .send()
            .await?;

        let intent: PaymentIntent = check_response(response).await?.json().await?;
        debug!(intent_id = %intent.id, amount = intent.amount, "Payment intent created");

        Ok(PaymentSession {
            gateway: GatewayKind::Stripe,
            reference: intent.id,
            client_secret: intent.client_secret,
            key_id: None,
            amount: request.amount.amount(),
            amount_minor: intent.amount,
            currency: intent.currency.to_uppercase(),
        })
    }
}

/// Form body for `POST /v1/payment_intents`.
fn intent_form(request: &PaymentRequest, amount_minor: i64) -> Vec<(&'static str, String)> {
    vec![
        ("amount", amount_minor.to_string()),
        ("currency", request.amount.currency().to_lowercase()),
        ("automatic_payment_methods[enabled]", "true".to_string()),
        ("receipt_email", request.customer_email.clone()),
        ("description", request.receipt.clone()),
        ("metadata[user_id]", request.metadata.user_id.to_string()),
        ("metadata[address_id]", request.metadata.address_id.to_string()),
        ("metadata[shipping_rate_id]", request.metadata.shipping_rate_id.to_string()),
    ]
}

fn parse_event(payload: &[u8]) -> Result<StripeEvent, PaymentError> {
    let envelope: Envelope = serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    match envelope.kind.as_str() {
        "payment_intent.succeeded" => {
            let intent: IntentObject =
                serde_json::from_value(envelope.data.object).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
            let metadata = PaymentMetadata::from_strings(
                intent.metadata.get("user_id").map(String::as_str),
                intent.metadata.get("address_id").map(String::as_str),
                intent.metadata.get("shipping_rate_id").map(String::as_str),
            )?;
            let currency = intent.currency.to_uppercase();
            Ok(StripeEvent::Succeeded(ConfirmedPayment {
                gateway: GatewayKind::Stripe,
                reference: intent.id,
                amount: Money::from_minor_units(intent.amount_received, &currency).amount(),
                currency,
                metadata,
            }))
        }
        "payment_intent.payment_failed" => {
            let intent: IntentObject =
                serde_json::from_value(envelope.data.object).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
            Ok(StripeEvent::Failed { intent_id: intent.id, reason: intent.last_payment_error.and_then(|e| e.message) })
        }
        other => Ok(StripeEvent::Ignored(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use uuid::Uuid;

    fn gateway() -> StripeGateway {
        StripeGateway::new(&StripeConfig {
            api_base: "https://api.stripe.com/v1".into(),
            secret_key: SecretString::from("sk_test".to_string()),
            webhook_secret: SecretString::from("whsec_test".to_string()),
        })
    }

    fn metadata() -> PaymentMetadata {
        PaymentMetadata { user_id: Uuid::new_v4(), address_id: Uuid::new_v4(), shipping_rate_id: Uuid::new_v4() }
    }

    #[test]
    fn test_intent_form_uses_sen_and_lowercase_currency() {
        let request = PaymentRequest {
            amount: Money::myr(Decimal::new(25990, 2)),
            receipt: "cart".into(),
            customer_email: "aisyah@example.com".into(),
            metadata: metadata(),
        };
        let form = intent_form(&request, request.amount.to_minor_units().unwrap());
        assert!(form.contains(&("amount", "25990".to_string())));
        assert!(form.contains(&("currency", "myr".to_string())));
        assert!(form.contains(&("metadata[user_id]", request.metadata.user_id.to_string())));
    }

    #[test]
    fn test_succeeded_event_parsed() {
        let meta = metadata();
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_123", "amount_received": 20800, "currency": "myr",
                "metadata": {
                    "user_id": meta.user_id.to_string(),
                    "address_id": meta.address_id.to_string(),
                    "shipping_rate_id": meta.shipping_rate_id.to_string()
                }
            }}
        })
        .to_string();
        let now = 1_700_000_000;
        let mut signed = format!("{now}.").into_bytes();
        signed.extend_from_slice(body.as_bytes());
        let header = format!("t={now},v1={}", signature::sign_hex(b"whsec_test", &signed));

        match gateway().parse_webhook(&header, body.as_bytes(), now).unwrap() {
            StripeEvent::Succeeded(paid) => {
                assert_eq!(paid.reference, "pi_123");
                assert_eq!(paid.amount, Decimal::new(20800, 2));
                assert_eq!(paid.currency, "MYR");
                assert_eq!(paid.metadata, meta);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unrelated_event_ignored() {
        let body = br#"{"type":"charge.refunded","data":{"object":{}}}"#;
        assert!(matches!(parse_event(body).unwrap(), StripeEvent::Ignored(kind) if kind == "charge.refunded"));
    }

    #[test]
    fn test_bad_signature_rejected_before_parsing() {
        let err = gateway().parse_webhook("t=1,v1=00", b"not json", 1).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature(_)));
    }
}
