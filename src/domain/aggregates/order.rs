//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::address::ShippingAddress;

text_enum! {
    OrderStatus {
        Pending => "pending",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
        Refunded => "refunded",
    }
}

text_enum! {
    PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        PartiallyRefunded => "partially_refunded",
        Refunded => "refunded",
        Failed => "failed",
    }
}

text_enum! {
    FulfillmentStatus { Unfulfilled => "unfulfilled", Fulfilled => "fulfilled", Returned => "returned" }
}

text_enum! {
    GatewayKind { Stripe => "stripe", Curlec => "curlec" }
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Delivered, Refunded)
        )
    }

    pub fn fulfillment(self) -> FulfillmentStatus {
        match self {
            Self::Shipped | Self::Delivered => FulfillmentStatus::Fulfilled,
            Self::Refunded => FulfillmentStatus::Returned,
            _ => FulfillmentStatus::Unfulfilled,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    #[sqlx(try_from = "String")]
    pub fulfillment_status: FulfillmentStatus,
    #[sqlx(try_from = "String")]
    pub payment_gateway: GatewayKind,
    pub payment_reference: Option<String>,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub refunded_total: Decimal,
    pub currency: String,
    pub shipping_address: sqlx::types::Json<ShippingAddress>,
    pub shipping_rate_id: Option<Uuid>,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validates a status change requested by the back-office.
    pub fn transition(&self, next: OrderStatus) -> Result<StatusChange, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        if next == OrderStatus::Processing && self.payment_status != PaymentStatus::Paid {
            return Err(OrderError::NotPaid);
        }
        Ok(StatusChange {
            from: self.status,
            to: next,
            fulfillment: next.fulfillment(),
            restock: next == OrderStatus::Cancelled,
        })
    }

    /// Payment status after a refund of `amount` on top of what was already refunded.
    pub fn refund(&self, amount: Decimal) -> Result<(Decimal, PaymentStatus), OrderError> {
        if amount <= Decimal::ZERO { return Err(OrderError::InvalidRefund); }
        let refunded = self.refunded_total + amount;
        if refunded > self.amount_paid { return Err(OrderError::RefundExceedsPayment); }
        let status = if refunded == self.amount_paid { PaymentStatus::Refunded } else { PaymentStatus::PartiallyRefunded };
        Ok((refunded, status))
    }
}

/// Outcome of a permitted status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub fulfillment: FulfillmentStatus,
    /// Units of a cancelled order go back on the shelf.
    pub restock: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
    /// Units taken out of stock at checkout; short when the shelf ran out.
    pub stocked_quantity: i32,
    /// Units put back since, by cancellation or received returns.
    pub restocked_quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl OrderItem {
    /// How many of `requested` units may go back into stock without
    /// returning more than the sale took out.
    pub fn restockable(&self, requested: i32) -> i32 {
        requested.min(self.stocked_quantity - self.restocked_quantity).max(0)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order number shown to customers, e.g. `BW240615-042137`.
///
/// `sequence` comes from the `order_number_seq` database sequence. The
/// suffix is an affine permutation of it modulo one million, so numbers
/// look unordered but never repeat within a day.
pub fn order_number(now: DateTime<Utc>, sequence: i64) -> String {
    const SPAN: i64 = 1_000_000;
    let suffix = (sequence.rem_euclid(SPAN) * 388_483 + 52_711) % SPAN;
    format!("BW{}-{:06}", now.format("%y%m%d"), suffix)
}

pub fn order_total(subtotal: Decimal, shipping: Decimal) -> Decimal { subtotal + shipping }

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("order has not been paid")]
    NotPaid,
    #[error("refund amount must be positive")]
    InvalidRefund,
    #[error("refund exceeds the amount paid")]
    RefundExceedsPayment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus, payment: PaymentStatus) -> Order {
        Order {
            id: Uuid::new_v4(), order_number: "BW240101-000001".into(), user_id: Uuid::new_v4(),
            email: "aisyah@example.com".into(), status, payment_status: payment,
            fulfillment_status: status.fulfillment(), payment_gateway: GatewayKind::Stripe,
            payment_reference: Some("pi_123".into()), subtotal: Decimal::from(200),
            shipping_total: Decimal::from(8), total: Decimal::from(208), amount_paid: Decimal::from(208),
            refunded_total: Decimal::ZERO, currency: "MYR".into(),
            shipping_address: sqlx::types::Json(ShippingAddress::default()), shipping_rate_id: None,
            shipping_method: None, tracking_number: None, notes: None, delivered_at: None,
            created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_workflow() {
        let o = order(OrderStatus::Processing, PaymentStatus::Paid);
        let change = o.transition(OrderStatus::Shipped).unwrap();
        assert_eq!(change.fulfillment, FulfillmentStatus::Fulfilled);
        assert!(!change.restock);
        assert!(o.transition(OrderStatus::Delivered).is_err());
    }

    #[test]
    fn test_cancel_restocks_and_delivered_cannot_cancel() {
        assert!(order(OrderStatus::Pending, PaymentStatus::Pending).transition(OrderStatus::Cancelled).unwrap().restock);
        assert_eq!(
            order(OrderStatus::Delivered, PaymentStatus::Paid).transition(OrderStatus::Cancelled),
            Err(OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Cancelled })
        );
    }

    #[test]
    fn test_processing_requires_payment() {
        assert_eq!(order(OrderStatus::Pending, PaymentStatus::Pending).transition(OrderStatus::Processing), Err(OrderError::NotPaid));
        assert!(order(OrderStatus::Pending, PaymentStatus::Paid).transition(OrderStatus::Processing).is_ok());
    }

    #[test]
    fn test_refund_accumulates() {
        let mut o = order(OrderStatus::Delivered, PaymentStatus::Paid);
        assert_eq!(o.refund(Decimal::from(100)).unwrap(), (Decimal::from(100), PaymentStatus::PartiallyRefunded));
        o.refunded_total = Decimal::from(100);
        assert_eq!(o.refund(Decimal::from(108)).unwrap(), (Decimal::from(208), PaymentStatus::Refunded));
        assert_eq!(o.refund(Decimal::from(109)), Err(OrderError::RefundExceedsPayment));
        assert_eq!(o.refund(Decimal::ZERO), Err(OrderError::InvalidRefund));
    }

    fn item(quantity: i32, stocked: i32, restocked: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(), order_id: Uuid::nil(), product_id: None, variant_id: Some(Uuid::new_v4()),
            name: "Kebaya Nyonya".into(), sku: "KN-S-WHT".into(), size: Some("S".into()), color: None, quantity,
            stocked_quantity: stocked, restocked_quantity: restocked, unit_price: Decimal::from(150),
            total: Decimal::from(150 * i64::from(quantity)),
        }
    }

    #[test]
    fn test_restock_limited_to_units_sold_from_stock() {
        assert_eq!(item(3, 3, 0).restockable(3), 3);
        // Checkout found the shelf empty; nothing was taken out.
        assert_eq!(item(3, 0, 0).restockable(3), 0);
        assert_eq!(item(3, 1, 0).restockable(2), 1);
        // One unit already came back through a return.
        assert_eq!(item(3, 3, 1).restockable(3), 2);
        assert_eq!(item(3, 3, 3).restockable(1), 0);
    }

    #[test]
    fn test_order_number_format() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 6, 15, 10, 0, 0).unwrap();
        let n = order_number(now, 42);
        assert!(n.starts_with("BW240615-"));
        assert_eq!(n.len(), "BW240615-".len() + 6);
        assert_eq!(order_number(now, i64::MAX).len(), n.len());
    }

    #[test]
    fn test_order_numbers_unique_across_sequence() {
        let now = Utc::now();
        let numbers: std::collections::HashSet<String> = (0..20_000).map(|seq| order_number(now, seq)).collect();
        assert_eq!(numbers.len(), 20_000);
    }
}
