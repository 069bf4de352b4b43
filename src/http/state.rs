//! Shared state handed to every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenSigner;
use crate::config::Config;
use crate::payments::{CurlecGateway, PaymentError, StripeGateway};
use crate::services::{CheckoutService, EventPublisher, Mailer, MediaStorage};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub tokens: TokenSigner,
    pub stripe: Option<Arc<StripeGateway>>,
    pub curlec: Option<Arc<CurlecGateway>>,
    pub events: EventPublisher,
    pub mailer: Mailer,
    pub media: MediaStorage,
}

impl AppState {
    /// Wires gateways and storage from `config`; NATS and SMTP come in ready-made.
    #[must_use]
    pub fn new(pool: PgPool, config: Config, events: EventPublisher, mailer: Mailer) -> Self {
        Self {
            tokens: TokenSigner::new(config.auth_secret.clone()),
            stripe: config.stripe.as_ref().map(|c| Arc::new(StripeGateway::new(c))),
            curlec: config.curlec.as_ref().map(|c| Arc::new(CurlecGateway::new(c))),
            media: MediaStorage::new(&config.media, &config.public_base_url),
            config: Arc::new(config),
            pool,
            events,
            mailer,
        }
    }

    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.pool, &self.events, &self.mailer)
    }

    pub fn stripe(&self) -> Result<&StripeGateway, PaymentError> {
        self.stripe.as_deref().ok_or(PaymentError::NotConfigured("stripe"))
    }

    pub fn curlec(&self) -> Result<&CurlecGateway, PaymentError> {
        self.curlec.as_deref().ok_or(PaymentError::NotConfigured("curlec"))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("stripe", &self.stripe.is_some())
            .field("curlec", &self.curlec.is_some())
            .field("events", &self.events)
            .field("mailer", &self.mailer)
            .finish_non_exhaustive()
    }
}
