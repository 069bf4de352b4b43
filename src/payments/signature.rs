//! HMAC-SHA256 helpers shared by webhook verification and session tokens.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Replay window for timestamped webhook signatures, in seconds.
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

/// Hex-encoded HMAC-SHA256 of `message` under `key`.
pub fn sign_hex(key: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_hex(key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&provided).is_ok()
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
pub fn verify_stripe(header: &str, payload: &[u8], secret: &str, now_unix: i64) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".into()));
    }
    if (now_unix - timestamp).abs() > STRIPE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance".into()));
    }

    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);

    if signatures.iter().any(|sig| verify_hex(secret.as_bytes(), &signed, sig)) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

/// Verifies an `X-Razorpay-Signature` webhook header (HMAC of the raw body).
pub fn verify_curlec_webhook(signature: &str, payload: &[u8], secret: &str) -> Result<(), PaymentError> {
    if verify_hex(secret.as_bytes(), payload, signature) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

/// Verifies the checkout callback signature, HMAC of `{order_id}|{payment_id}`.
pub fn verify_curlec_payment(order_id: &str, payment_id: &str, signature: &str, key_secret: &str) -> Result<(), PaymentError> {
    let message = format!("{order_id}|{payment_id}");
    if verify_hex(key_secret.as_bytes(), message.as_bytes(), signature) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("payment signature mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    fn stripe_header(t: i64, body: &[u8]) -> String {
        let mut signed = format!("{t}.").into_bytes();
        signed.extend_from_slice(body);
        format!("t={t},v1={}", sign_hex(SECRET.as_bytes(), &signed))
    }

    #[test]
    fn test_stripe_signature_accepted() {
        let now = 1_700_000_000;
        assert!(verify_stripe(&stripe_header(now - 10, BODY), BODY, SECRET, now).is_ok());
    }

    #[test]
    fn test_stripe_signature_tampered_body() {
        let now = 1_700_000_000;
        let header = stripe_header(now, BODY);
        assert!(verify_stripe(&header, br#"{"id":"evt_2"}"#, SECRET, now).is_err());
        assert!(verify_stripe(&header, BODY, "whsec_other", now).is_err());
    }

    #[test]
    fn test_stripe_signature_stale() {
        let now = 1_700_000_000;
        let header = stripe_header(now - STRIPE_TOLERANCE_SECS - 1, BODY);
        assert!(matches!(verify_stripe(&header, BODY, SECRET, now), Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_stripe_header_malformed() {
        assert!(verify_stripe("v1=abc", BODY, SECRET, 0).is_err());
        assert!(verify_stripe("t=5", BODY, SECRET, 5).is_err());
        assert!(verify_stripe("t=5,v1=not-hex", BODY, SECRET, 5).is_err());
    }

    #[test]
    fn test_curlec_webhook_signature() {
        let sig = sign_hex(SECRET.as_bytes(), BODY);
        assert!(verify_curlec_webhook(&sig, BODY, SECRET).is_ok());
        assert!(verify_curlec_webhook(&sig, b"{}", SECRET).is_err());
    }

    #[test]
    fn test_curlec_payment_signature() {
        let sig = sign_hex(b"key_secret", b"order_ABC|pay_XYZ");
        assert!(verify_curlec_payment("order_ABC", "pay_XYZ", &sig, "key_secret").is_ok());
        assert!(verify_curlec_payment("order_ABC", "pay_OTHER", &sig, "key_secret").is_err());
    }
}
