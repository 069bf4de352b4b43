//! Publishes domain events to NATS when a connection is configured.

use crate::domain::events::{DomainEvent, InventoryEvent};
use crate::domain::aggregates::ProductVariant;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").field("connected", &self.nats.is_some()).finish()
    }
}

impl EventPublisher {
    #[must_use]
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    /// Connects to `url`; an unreachable server disables publishing instead of failing startup.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            return Self::default();
        };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "Connected to NATS");
                Self::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, domain events disabled");
                Self::default()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    /// Best effort: failures are logged, never returned to the caller.
    pub async fn publish(&self, event: DomainEvent) {
        let Some(client) = &self.nats else {
            tracing::debug!(subject = %event.subject(), "NATS disabled, event dropped");
            return;
        };
        let subject = event.subject();
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(%subject, error = %e, "Failed to serialise event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, error = %e, "Failed to publish event");
        }
    }

    /// Emits `inventory.low_stock` when a variant is at or below the threshold.
    pub async fn low_stock_check(&self, variant: &ProductVariant, threshold: i32) {
        let level = variant.stock_level();
        if level.is_low(threshold) {
            self.publish(DomainEvent::Inventory(InventoryEvent::LowStock {
                variant_id: variant.id,
                sku: variant.sku.clone(),
                available: level.available(),
            }))
            .await;
        }
    }
}
