//! Signed bearer tokens: `<user_id>.<expiry_unix>.<hex hmac-sha256>`.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::AuthError;
use crate::payments::signature::{sign_hex, verify_hex};

pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

/// A freshly issued token.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret, ttl: Duration::days(DEFAULT_TOKEN_TTL_DAYS) }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> IssuedToken {
        let expires_at = now + self.ttl;
        let payload = format!("{user_id}.{}", expires_at.timestamp());
        let signature = sign_hex(self.secret.expose_secret().as_bytes(), payload.as_bytes());
        IssuedToken { token: format!("{payload}.{signature}"), expires_at }
    }

    /// Returns the user id of a valid, unexpired token.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, AuthError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        if !verify_hex(self.secret.expose_secret().as_bytes(), payload.as_bytes(), signature) {
            return Err(AuthError::InvalidToken);
        }

        let (user_id, expiry) = payload.split_once('.').ok_or(AuthError::InvalidToken)?;
        let expiry: i64 = expiry.parse().map_err(|_| AuthError::InvalidToken)?;
        if now.timestamp() >= expiry {
            return Err(AuthError::TokenExpired);
        }
        Uuid::parse_str(user_id).map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner { TokenSigner::new(SecretString::from("a".repeat(32))) }

    #[test]
    fn test_issue_then_verify() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let issued = signer().issue(user, now);
        assert_eq!(issued.expires_at, now + Duration::days(7));
        assert_eq!(signer().verify(&issued.token, now).unwrap(), user);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let now = Utc::now();
        let issued = signer().issue(Uuid::new_v4(), now);
        let forged = issued.token.replacen(&issued.token[..8], &Uuid::new_v4().to_string()[..8], 1);
        assert!(matches!(signer().verify(&forged, now), Err(AuthError::InvalidToken)));

        let other = TokenSigner::new(SecretString::from("b".repeat(32)));
        assert!(matches!(other.verify(&issued.token, now), Err(AuthError::InvalidToken)));
        assert!(matches!(signer().verify("garbage", now), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let issued = signer().with_ttl(Duration::seconds(60)).issue(Uuid::new_v4(), now);
        assert!(matches!(signer().verify(&issued.token, now + Duration::seconds(61)), Err(AuthError::TokenExpired)));
    }
}
