//! Domain events
//!
//! Published to NATS so dashboards and the storefront can react in real time.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, ReturnStatus};

pub const SUBJECT_PREFIX: &str = "binwahab";

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Return(ReturnEvent),
    Inventory(InventoryEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, user_id: Uuid, total: Decimal },
    StatusChanged { order_id: Uuid, order_number: String, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReturnEvent {
    StatusChanged { return_id: Uuid, order_id: Uuid, from: ReturnStatus, to: ReturnStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InventoryEvent {
    LowStock { variant_id: Uuid, sku: String, available: i32 },
}

impl DomainEvent {
    /// NATS subject, e.g. `binwahab.order.created`.
    pub fn subject(&self) -> String {
        let name = match self {
            Self::Order(OrderEvent::Created { .. }) => "order.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Return(ReturnEvent::StatusChanged { .. }) => "return.status_changed",
            Self::Inventory(InventoryEvent::LowStock { .. }) => "inventory.low_stock",
        };
        format!("{SUBJECT_PREFIX}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        let e = DomainEvent::Inventory(InventoryEvent::LowStock { variant_id: Uuid::nil(), sku: "A".into(), available: 1 });
        assert_eq!(e.subject(), "binwahab.inventory.low_stock");
    }

    #[test]
    fn test_payload_shape() {
        let e = DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: Uuid::nil(),
            order_number: "BW240101-000001".into(),
            from: OrderStatus::Processing,
            to: OrderStatus::Shipped,
        });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(json["event"], "status_changed");
        assert_eq!(json["to"], "shipped");
    }
}
