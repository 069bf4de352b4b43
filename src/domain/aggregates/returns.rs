//! Return requests

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::order::{Order, OrderItem, OrderStatus};

pub const DEFAULT_RETURN_WINDOW_DAYS: i64 = 14;

text_enum! {
    ReturnStatus {
        Requested => "requested",
        Approved => "approved",
        Rejected => "rejected",
        Received => "received",
        Refunded => "refunded",
    }
}

impl ReturnStatus {
    pub fn can_transition_to(self, next: ReturnStatus) -> bool {
        use ReturnStatus::*;
        matches!((self, next), (Requested, Approved) | (Requested, Rejected) | (Approved, Received) | (Received, Refunded))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: ReturnStatus,
    pub reason: String,
    pub refund_amount: Option<Decimal>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReturnRequest {
    pub fn transition(&self, next: ReturnStatus) -> Result<(), ReturnError> {
        if self.status.can_transition_to(next) { Ok(()) } else { Err(ReturnError::InvalidTransition { from: self.status, to: next }) }
    }
}

/// Return item joined with the order line it refers to.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ReturnItemLine {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl ReturnItemLine {
    pub fn total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReturnDetail {
    #[serde(flatten)]
    pub request: ReturnRequest,
    pub order_number: String,
    pub items: Vec<ReturnItemLine>,
}

impl ReturnDetail {
    pub fn refundable(&self) -> Decimal { self.items.iter().map(ReturnItemLine::total).sum() }
}

/// A return may be opened for a delivered order inside the return window.
pub fn check_eligibility(order: &Order, now: DateTime<Utc>, window_days: i64) -> Result<(), ReturnError> {
    if order.status != OrderStatus::Delivered { return Err(ReturnError::NotDelivered); }
    let delivered = order.delivered_at.unwrap_or(order.updated_at);
    if now > delivered + Duration::days(window_days) { return Err(ReturnError::WindowClosed { days: window_days }); }
    Ok(())
}

/// Validates requested `(order_item_id, quantity)` pairs and returns their refundable value.
///
/// `already_returned` counts units of each order item on earlier, non-rejected returns.
pub fn validate_items(
    requested: &[(Uuid, i32)],
    ordered: &[OrderItem],
    already_returned: &HashMap<Uuid, i32>,
) -> Result<Decimal, ReturnError> {
    if requested.is_empty() { return Err(ReturnError::NoItems); }
    let mut seen = HashMap::new();
    let mut value = Decimal::ZERO;
    for (item_id, qty) in requested {
        if *qty <= 0 { return Err(ReturnError::InvalidQuantity); }
        if seen.insert(*item_id, ()).is_some() { return Err(ReturnError::DuplicateItem(*item_id)); }
        let item = ordered.iter().find(|i| i.id == *item_id).ok_or(ReturnError::UnknownItem(*item_id))?;
        let remaining = item.quantity - already_returned.get(item_id).copied().unwrap_or(0);
        if *qty > remaining { return Err(ReturnError::TooMany { sku: item.sku.clone(), remaining }); }
        value += item.unit_price * Decimal::from(*qty);
    }
    Ok(value)
}

pub fn validate_refund(amount: Decimal, refundable: Decimal) -> Result<(), ReturnError> {
    if amount <= Decimal::ZERO || amount > refundable { return Err(ReturnError::RefundOutOfRange { max: refundable }); }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnError {
    #[error("only delivered orders can be returned")]
    NotDelivered,
    #[error("the {days}-day return window has closed")]
    WindowClosed { days: i64 },
    #[error("a return needs at least one item")]
    NoItems,
    #[error("return quantities must be positive")]
    InvalidQuantity,
    #[error("item {0} listed twice")]
    DuplicateItem(Uuid),
    #[error("item {0} is not part of this order")]
    UnknownItem(Uuid),
    #[error("only {remaining} of {sku} can still be returned")]
    TooMany { sku: String, remaining: i32 },
    #[error("cannot move return from {from} to {to}")]
    InvalidTransition { from: ReturnStatus, to: ReturnStatus },
    #[error("refund must be between 0 and {max}")]
    RefundOutOfRange { max: Decimal },
    #[error("refunds are recorded through the refund action with an amount")]
    RefundNeedsAmount,
}
