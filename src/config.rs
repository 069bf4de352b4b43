//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `AUTH_SECRET` - Token signing secret (min 32 chars)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `PUBLIC_BASE_URL` - Base URL used for media links (default: http://localhost:8083)
//! - `CORS_ORIGINS` - Comma separated allowed origins (default: permissive)
//! - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET` - Enable Stripe checkout
//! - `CURLEC_KEY_ID`, `CURLEC_KEY_SECRET`, `CURLEC_WEBHOOK_SECRET` - Enable Curlec checkout
//! - `CURLEC_API_BASE` - Curlec API base (default: https://api.razorpay.com/v1)
//! - `NATS_URL` - Publish domain events to NATS
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `MAIL_FROM` - Enable email
//! - `MEDIA_DIR` - Upload directory (default: ./media)
//! - `MEDIA_MAX_BYTES` - Upload size limit (default: 8 MiB)
//! - `BOOTSTRAP_ADMIN_EMAIL`, `BOOTSTRAP_ADMIN_PASSWORD` - Create an admin account on startup
//! - `BOOTSTRAP_ADMIN_NAME` - Display name for that account (default: Store Admin)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_AUTH_SECRET_LENGTH: usize = 32;
const DEFAULT_PORT: u16 = 8083;
const DEFAULT_MEDIA_MAX_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_CURLEC_API_BASE: &str = "https://api.razorpay.com/v1";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub public_base_url: String,
    pub auth_secret: SecretString,
    pub cors_origins: Vec<String>,
    pub stripe: Option<StripeConfig>,
    pub curlec: Option<CurlecConfig>,
    pub nats_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub media: MediaConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Admin account ensured at startup so a fresh database can be managed.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: SecretString,
}

#[derive(Clone)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
}

#[derive(Clone)]
pub struct CurlecConfig {
    pub api_base: String,
    pub key_id: String,
    pub key_secret: SecretString,
    pub webhook_secret: SecretString,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for CurlecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurlecConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let database_url = SecretString::from(required("DATABASE_URL")?);

        let auth_secret = required("AUTH_SECRET")?;
        if auth_secret.len() < MIN_AUTH_SECRET_LENGTH {
            return Err(ConfigError::InvalidEnvVar(
                "AUTH_SECRET".to_string(),
                format!("must be at least {MIN_AUTH_SECRET_LENGTH} characters"),
            ));
        }

        let host = match get("HOST") {
            Some(h) => h.parse().map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), format!("{e}")))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| v.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
            .unwrap_or_default();

        let stripe = match (get("STRIPE_SECRET_KEY"), get("STRIPE_WEBHOOK_SECRET")) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeConfig {
                api_base: get("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
                secret_key: SecretString::from(secret_key),
                webhook_secret: SecretString::from(webhook_secret),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "STRIPE_SECRET_KEY".to_string(),
                    "STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET must be set together".to_string(),
                ))
            }
        };

        let curlec = match (get("CURLEC_KEY_ID"), get("CURLEC_KEY_SECRET"), get("CURLEC_WEBHOOK_SECRET")) {
            (Some(key_id), Some(key_secret), Some(webhook_secret)) => Some(CurlecConfig {
                api_base: get("CURLEC_API_BASE")
                    .unwrap_or_else(|| DEFAULT_CURLEC_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                key_id,
                key_secret: SecretString::from(key_secret),
                webhook_secret: SecretString::from(webhook_secret),
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "CURLEC_KEY_ID".to_string(),
                    "CURLEC_KEY_ID, CURLEC_KEY_SECRET and CURLEC_WEBHOOK_SECRET must be set together".to_string(),
                ))
            }
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                username: required("SMTP_USERNAME")?,
                password: SecretString::from(required("SMTP_PASSWORD")?),
                from_address: required("MAIL_FROM")?,
            }),
            None => None,
        };

        let media = MediaConfig {
            dir: get("MEDIA_DIR").map_or_else(|| PathBuf::from("./media"), PathBuf::from),
            max_bytes: parse_or("MEDIA_MAX_BYTES", get("MEDIA_MAX_BYTES"), DEFAULT_MEDIA_MAX_BYTES)?,
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                name: get("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Store Admin".to_string()),
                password: SecretString::from(password),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "BOOTSTRAP_ADMIN_EMAIL".to_string(),
                    "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            public_base_url,
            auth_secret: SecretString::from(auth_secret),
            cors_origins,
            stripe,
            curlec,
            nats_url: get("NATS_URL"),
            smtp,
            media,
            bootstrap_admin,
        })
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }

    #[must_use]
    pub fn database_url(&self) -> &str { self.database_url.expose_secret() }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "k3b9-Qz7x!mT2vR8pL0sW4yN6dF1hJ5a";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config() {
        let cfg = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/binwahab"), ("AUTH_SECRET", SECRET)])).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.public_base_url, "http://localhost:8083");
        assert!(cfg.stripe.is_none());
        assert!(cfg.curlec.is_none());
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.media.max_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn test_missing_database_url() {
        let err = Config::from_lookup(lookup(&[("AUTH_SECRET", SECRET)])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "DATABASE_URL"));
    }

    #[test]
    fn test_short_auth_secret_rejected() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("AUTH_SECRET", "short")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "AUTH_SECRET"));
    }

    #[test]
    fn test_partial_stripe_config_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("AUTH_SECRET", SECRET),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_gateways_and_cors() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("AUTH_SECRET", SECRET),
            ("PORT", "9000"),
            ("CORS_ORIGINS", "https://binwahab.com, https://admin.binwahab.com"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
            ("CURLEC_KEY_ID", "rzp_test_1"),
            ("CURLEC_KEY_SECRET", "secret"),
            ("CURLEC_WEBHOOK_SECRET", "hook"),
            ("CURLEC_API_BASE", "https://api.curlec.test/v1/"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.cors_origins.len(), 2);
        assert!(cfg.stripe.is_some());
        assert_eq!(cfg.curlec.unwrap().api_base, "https://api.curlec.test/v1");
    }

    #[test]
    fn test_bootstrap_admin() {
        let base = [("DATABASE_URL", "postgres://x"), ("AUTH_SECRET", SECRET)];
        let cfg = Config::from_lookup(lookup(&[base[0], base[1], ("BOOTSTRAP_ADMIN_EMAIL", "ops@binwahab.com"), ("BOOTSTRAP_ADMIN_PASSWORD", "songket-emas")])).unwrap();
        let admin = cfg.bootstrap_admin.unwrap();
        assert_eq!(admin.name, "Store Admin");
        assert_eq!(admin.password.expose_secret(), "songket-emas");

        let err = Config::from_lookup(lookup(&[base[0], base[1], ("BOOTSTRAP_ADMIN_EMAIL", "ops@binwahab.com")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "BOOTSTRAP_ADMIN_EMAIL"));
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("AUTH_SECRET", SECRET), ("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "PORT"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = StripeConfig {
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            secret_key: SecretString::from("sk_live_abc".to_string()),
            webhook_secret: SecretString::from("whsec_abc".to_string()),
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("sk_live_abc"));
        assert!(out.contains("[REDACTED]"));
    }
}
