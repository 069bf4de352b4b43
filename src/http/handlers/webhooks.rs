//! Payment gateway webhooks.
//!
//! The raw body is needed for signature checks, so these take `Bytes`.
//! A bad signature is a 400. Once the event is authentic, drift in the
//! cart or rates still yields an order held for review. Failures that
//! cannot produce an order (a deleted customer) are logged and
//! acknowledged; server-side failures and unique-key races return an error
//! so the gateway retries.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::Result;
use crate::http::AppState;
use crate::payments::curlec::CurlecEvent;
use crate::payments::stripe::StripeEvent;
use crate::payments::{ConfirmedPayment, PaymentError};

const STRIPE_SIGNATURE: &str = "stripe-signature";
const CURLEC_SIGNATURE: &str = "x-razorpay-signature";

fn signature<'h>(headers: &'h HeaderMap, name: &str) -> std::result::Result<&'h str, PaymentError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::InvalidSignature(format!("missing {name} header")))
}

fn received() -> Json<Value> { Json(json!({ "received": true })) }

pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    let gateway = state.stripe()?;
    let event = gateway.parse_webhook(signature(&headers, STRIPE_SIGNATURE)?, &body, Utc::now().timestamp())?;

    match event {
        StripeEvent::Succeeded(paid) => finalize(&state, paid).await?,
        StripeEvent::Failed { intent_id, reason } => {
            tracing::warn!(%intent_id, reason = reason.as_deref().unwrap_or("unknown"), "Stripe payment failed");
        }
        StripeEvent::Ignored(kind) => tracing::debug!(%kind, "Stripe event ignored"),
    }
    Ok(received())
}

pub async fn curlec(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    let gateway = state.curlec()?;
    match gateway.parse_webhook(signature(&headers, CURLEC_SIGNATURE)?, &body)? {
        CurlecEvent::Paid { order_id } => {
            let paid = gateway.confirm_order(&order_id).await?;
            finalize(&state, paid).await?;
        }
        CurlecEvent::Ignored(kind) => tracing::debug!(%kind, "Curlec event ignored"),
    }
    Ok(received())
}

async fn finalize(state: &AppState, paid: ConfirmedPayment) -> Result<()> {
    match state.checkout().finalize(&paid).await {
        Ok(done) if done.created => {
            tracing::info!(reference = %paid.reference, order_number = %done.order.order_number, "Webhook created order");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.is_retryable() => Err(e),
        Err(e) => {
            tracing::error!(reference = %paid.reference, gateway = %paid.gateway, error = %e, "Paid webhook could not create an order");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_signature_header_lookup() {
        let mut headers = HeaderMap::new();
        assert!(matches!(signature(&headers, STRIPE_SIGNATURE), Err(PaymentError::InvalidSignature(_))));
        headers.insert(STRIPE_SIGNATURE, HeaderValue::from_static("t=1,v1=ab"));
        assert_eq!(signature(&headers, STRIPE_SIGNATURE).unwrap(), "t=1,v1=ab");
    }
}
