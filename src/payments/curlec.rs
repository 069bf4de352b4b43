//! Curlec (Razorpay-compatible) Orders API client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::{check_response, signature, ConfirmedPayment, PaymentError, PaymentGateway, PaymentMetadata, PaymentRequest, PaymentSession};
use crate::config::CurlecConfig;
use crate::domain::aggregates::GatewayKind;
use crate::domain::value_objects::Money;

#[derive(Clone)]
pub struct CurlecGateway {
    client: Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for CurlecGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurlecGateway")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CreateOrder<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: HashMap<&'static str, String>,
}

/// Order as returned by `POST /orders` and `GET /orders/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurlecOrder {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub notes: serde_json::Value,
}

impl CurlecOrder {
    /// The captured payment on this order. Orders the gateway has not marked
    /// `paid`, or with nothing captured, are rejected.
    fn confirmed(&self) -> Result<ConfirmedPayment, PaymentError> {
        if self.status != "paid" || self.amount_paid <= 0 {
            return Err(PaymentError::NotCaptured(format!("{} is {} with {} captured", self.id, self.status, self.amount_paid)));
        }
        let note = |key: &str| self.notes.get(key).and_then(serde_json::Value::as_str);
        let metadata = PaymentMetadata::from_strings(note("user_id"), note("address_id"), note("shipping_rate_id"))?;
        let minor = self.amount_paid;
        let currency = self.currency.to_uppercase();
        Ok(ConfirmedPayment {
            gateway: GatewayKind::Curlec,
            reference: self.id.clone(),
            amount: Money::from_minor_units(minor, &currency).amount(),
            currency,
            metadata,
        })
    }
}

/// Webhook events we act on. Both carry the gateway order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurlecEvent {
    Paid { order_id: String },
    Ignored(String),
}

impl CurlecGateway {
    #[must_use]
    pub fn new(config: &CurlecConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_order(&self, order_id: &str) -> Result<CurlecOrder, PaymentError> {
        let response = self
            .client
            .get(format!("{}/orders/{order_id}", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Checks the signature the checkout widget returns, then loads the
    /// order to recover amount and metadata.
    pub async fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<ConfirmedPayment, PaymentError> {
        signature::verify_curlec_payment(order_id, payment_id, signature, self.key_secret.expose_secret())?;
        self.fetch_order(order_id).await?.confirmed()
    }

    pub fn parse_webhook(&self, signature_header: &str, payload: &[u8]) -> Result<CurlecEvent, PaymentError> {
        signature::verify_curlec_webhook(signature_header, payload, self.webhook_secret.expose_secret())?;
        parse_event(payload)
    }

    /// Resolves a webhook's order into a confirmed payment.
    pub async fn confirm_order(&self, order_id: &str) -> Result<ConfirmedPayment, PaymentError> {
        self.fetch_order(order_id).await?.confirmed()
    }
}

#[async_trait]
impl PaymentGateway for CurlecGateway {
    fn kind(&self) -> GatewayKind { GatewayKind::Curlec }

    #[instrument(skip(self, request), fields(receipt = %request.receipt))]
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let amount_minor = request.amount.to_minor_units()?;
        let body = create_order_body(request, amount_minor);

        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let order: CurlecOrder = check_response(response).await?.json().await?;
        debug!(order_id = %order.id, amount = order.amount, "Curlec order created");

        Ok(PaymentSession {
            gateway: GatewayKind::Curlec,
            reference: order.id,
            client_secret: None,
            key_id: Some(self.key_id.clone()),
            amount: request.amount.amount(),
            amount_minor: order.amount,
            currency: order.currency.to_uppercase(),
        })
    }
}

fn create_order_body(request: &PaymentRequest, amount_minor: i64) -> CreateOrder<'_> {
    let notes = HashMap::from([
        ("user_id", request.metadata.user_id.to_string()),
        ("address_id", request.metadata.address_id.to_string()),
        ("shipping_rate_id", request.metadata.shipping_rate_id.to_string()),
        ("email", request.customer_email.clone()),
    ]);
    CreateOrder { amount: amount_minor, currency: request.amount.currency(), receipt: &request.receipt, notes }
}

fn parse_event(payload: &[u8]) -> Result<CurlecEvent, PaymentError> {
    let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
    let event = value["event"].as_str().unwrap_or_default();

    let order_id = match event {
        "payment.captured" => value["payload"]["payment"]["entity"]["order_id"].as_str(),
        "order.paid" => value["payload"]["order"]["entity"]["id"].as_str(),
        other => return Ok(CurlecEvent::Ignored(other.to_string())),
    };

    order_id
        .map(|id| CurlecEvent::Paid { order_id: id.to_string() })
        .ok_or_else(|| PaymentError::InvalidPayload(format!("{event} without an order id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use uuid::Uuid;

    fn gateway() -> CurlecGateway {
        CurlecGateway::new(&CurlecConfig {
            api_base: "https://api.razorpay.com/v1/".into(),
            key_id: "rzp_test".into(),
            key_secret: SecretString::from("key_secret".to_string()),
            webhook_secret: SecretString::from("hook_secret".to_string()),
        })
    }

    #[test]
    fn test_order_body_carries_metadata_in_notes() {
        let meta = PaymentMetadata { user_id: Uuid::new_v4(), address_id: Uuid::new_v4(), shipping_rate_id: Uuid::new_v4() };
        let request = PaymentRequest {
            amount: Money::myr(Decimal::new(15000, 2)),
            receipt: "cart-1".into(),
            customer_email: "aisyah@example.com".into(),
            metadata: meta,
        };
        let body = serde_json::to_value(create_order_body(&request, 15000)).unwrap();
        assert_eq!(body["amount"], 15000);
        assert_eq!(body["currency"], "MYR");
        assert_eq!(body["notes"]["address_id"], meta.address_id.to_string());
    }

    #[test]
    fn test_webhook_events() {
        let captured = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_9"}}}}"#;
        let sig = signature::sign_hex(b"hook_secret", captured);
        assert_eq!(gateway().parse_webhook(&sig, captured).unwrap(), CurlecEvent::Paid { order_id: "order_9".into() });

        let paid = br#"{"event":"order.paid","payload":{"order":{"entity":{"id":"order_7"}}}}"#;
        assert_eq!(parse_event(paid).unwrap(), CurlecEvent::Paid { order_id: "order_7".into() });

        let other = br#"{"event":"refund.created","payload":{}}"#;
        assert_eq!(parse_event(other).unwrap(), CurlecEvent::Ignored("refund.created".into()));
    }

    #[test]
    fn test_webhook_rejects_bad_signature() {
        let body = br#"{"event":"order.paid"}"#;
        assert!(matches!(gateway().parse_webhook("deadbeef", body), Err(PaymentError::InvalidSignature(_))));
    }

    fn order(status: &str, amount_paid: i64, user: Uuid) -> CurlecOrder {
        CurlecOrder {
            id: "order_1".into(),
            amount: 20800,
            amount_paid,
            currency: "MYR".into(),
            status: status.into(),
            notes: serde_json::json!({
                "user_id": user.to_string(),
                "address_id": Uuid::new_v4().to_string(),
                "shipping_rate_id": Uuid::new_v4().to_string()
            }),
        }
    }

    #[test]
    fn test_confirmed_uses_amount_paid() {
        let user = Uuid::new_v4();
        let paid = order("paid", 20000, user).confirmed().unwrap();
        assert_eq!(paid.amount, Decimal::new(20000, 2));
        assert_eq!(paid.metadata.user_id, user);
    }

    #[test]
    fn test_unpaid_order_not_confirmed() {
        let user = Uuid::new_v4();
        assert!(matches!(order("created", 0, user).confirmed(), Err(PaymentError::NotCaptured(_))));
        assert!(matches!(order("attempted", 0, user).confirmed(), Err(PaymentError::NotCaptured(_))));
        assert!(matches!(order("paid", 0, user).confirmed(), Err(PaymentError::NotCaptured(_))));
    }
}
