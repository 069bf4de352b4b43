//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::inventory::{self, InventoryWriteError, Movement};
use super::{like_pattern, Page, Paginated, RepositoryError};
use crate::domain::aggregates::order::{order_number, StatusChange};
use crate::domain::aggregates::{
    FulfillmentStatus, GatewayKind, InventoryError, InventoryTransactionKind, Order, OrderDetail, OrderError, OrderItem,
    OrderStatus, PaymentStatus, ShippingAddress,
};

/// Values for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Uuid,
    pub email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_gateway: GatewayKind,
    pub payment_reference: String,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub currency: String,
    pub shipping_address: ShippingAddress,
    pub shipping_rate_id: Option<Uuid>,
    pub shipping_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub name: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
    pub stocked_quantity: i32,
    pub unit_price: Decimal,
}

/// Back-office list filters.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub search: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderWriteError {
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<InventoryWriteError> for OrderWriteError {
    fn from(err: InventoryWriteError) -> Self {
        match err {
            InventoryWriteError::Inventory(e) => Self::Inventory(e),
            InventoryWriteError::Repository(e) => Self::Repository(e),
        }
    }
}

impl From<sqlx::Error> for OrderWriteError {
    fn from(err: sqlx::Error) -> Self { Self::Repository(err.into()) }
}

const FILTER: &str = "($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR status = $2) \
    AND ($3::text IS NULL OR payment_status = $3) AND ($4::text IS NULL OR order_number ILIKE $4 OR email ILIKE $4)";

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &OrderFilter, page: Page) -> Result<Paginated<Order>, RepositoryError> {
        let status = filter.status.map(|s| s.as_str());
        let payment_status = filter.payment_status.map(|s| s.as_str());
        let pattern = filter.search.as_deref().map(like_pattern);

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT * FROM orders WHERE {FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.user_id)
        .bind(status)
        .bind(payment_status)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders WHERE {FILTER}"))
            .bind(filter.user_id)
            .bind(status)
            .bind(payment_status)
            .bind(&pattern)
            .fetch_one(self.pool)
            .await?;

        Ok(Paginated::new(orders, total, page))
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("order"))
    }

    /// Customer view: someone else's order reads as not found.
    pub async fn get_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("order"))
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_reference = $1")
            .bind(reference)
            .fetch_optional(self.pool)
            .await?)
    }

    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY name, sku")
            .bind(order_id)
            .fetch_all(self.pool)
            .await?)
    }

    pub async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let items = self.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Moves an order along its workflow. Cancelling puts the units taken
    /// from stock back in the same transaction.
    pub async fn update_status(
        &self,
        id: Uuid,
        next: OrderStatus,
        tracking_number: Option<&str>,
        actor: Uuid,
    ) -> Result<(Order, StatusChange), OrderWriteError> {
        let mut tx = self.pool.begin().await?;
        let order = lock(&mut tx, id).await?;
        let change = order.transition(next)?;

        let updated = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $2, fulfillment_status = $3, tracking_number = COALESCE($4, tracking_number), \
             delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(change.to.as_str())
        .bind(change.fulfillment.as_str())
        .bind(tracking_number)
        .fetch_one(&mut *tx)
        .await?;

        if change.restock {
            let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 FOR UPDATE")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
            let back = PutBack { kind: InventoryTransactionKind::Restock, reference: &order.order_number, note: "order cancelled", actor };
            for item in &items {
                put_back(&mut tx, item, item.quantity, &back).await?;
            }
        }

        tx.commit().await?;
        Ok((updated, change))
    }
}

/// Draws the next customer-facing order number.
pub async fn next_order_number(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<String, RepositoryError> {
    let (sequence,): (i64,) = sqlx::query_as("SELECT nextval('order_number_seq')").fetch_one(conn).await?;
    Ok(order_number(now, sequence))
}

/// How returned units are booked by [`put_back`].
#[derive(Debug, Clone, Copy)]
pub struct PutBack<'p> {
    pub kind: InventoryTransactionKind,
    pub reference: &'p str,
    pub note: &'p str,
    pub actor: Uuid,
}

/// Returns up to `requested` units of a locked order item to stock, capped
/// at what its sale took out. Yields the number of units moved.
pub async fn put_back(conn: &mut PgConnection, item: &OrderItem, requested: i32, back: &PutBack<'_>) -> Result<i32, OrderWriteError> {
    let units = item.restockable(requested);
    if units < requested {
        tracing::warn!(sku = %item.sku, requested, units, "Restock capped at units sold from stock");
    }
    let Some(variant_id) = item.variant_id.filter(|_| units > 0) else { return Ok(0) };

    inventory::apply(
        &mut *conn,
        &Movement {
            variant_id,
            kind: back.kind,
            quantity: units,
            reference: Some(back.reference),
            note: Some(back.note),
            actor: Some(back.actor),
        },
    )
    .await?;
    sqlx::query("UPDATE order_items SET restocked_quantity = restocked_quantity + $2 WHERE id = $1")
        .bind(item.id)
        .bind(units)
        .execute(&mut *conn)
        .await?;
    Ok(units)
}

/// Inserts the order and its items inside the caller's transaction.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder, items: &[NewOrderItem]) -> Result<Order, RepositoryError> {
    let created = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, order_number, user_id, email, status, payment_status, fulfillment_status, payment_gateway, \
             payment_reference, subtotal, shipping_total, total, amount_paid, refunded_total, currency, shipping_address, \
             shipping_rate_id, shipping_method, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, $14, $15, $16, $17, $18, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(&order.email)
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(FulfillmentStatus::Unfulfilled.as_str())
    .bind(order.payment_gateway.as_str())
    .bind(&order.payment_reference)
    .bind(order.subtotal)
    .bind(order.shipping_total)
    .bind(order.total)
    .bind(order.amount_paid)
    .bind(&order.currency)
    .bind(Json(&order.shipping_address))
    .bind(order.shipping_rate_id)
    .bind(&order.shipping_method)
    .bind(&order.notes)
    .fetch_one(&mut *conn)
    .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, variant_id, name, sku, size, color, quantity, stocked_quantity, \
                 unit_price, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(Uuid::now_v7())
        .bind(created.id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(&item.size)
        .bind(&item.color)
        .bind(item.quantity)
        .bind(item.stocked_quantity)
        .bind(item.unit_price)
        .bind(item.unit_price * Decimal::from(item.quantity))
        .execute(&mut *conn)
        .await?;
    }

    Ok(created)
}

/// Row-locks an order for the rest of the transaction.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound("order"))
}

/// Records a refund against the order. A full refund of a delivered order
/// also moves it to `refunded`.
pub async fn record_refund(conn: &mut PgConnection, order: &Order, amount: Decimal) -> Result<Order, OrderWriteError> {
    let (refunded_total, payment_status) = order.refund(amount)?;
    let (status, fulfillment) = if payment_status == PaymentStatus::Refunded && order.status.can_transition_to(OrderStatus::Refunded) {
        (OrderStatus::Refunded, OrderStatus::Refunded.fulfillment())
    } else {
        (order.status, order.fulfillment_status)
    };

    Ok(sqlx::query_as::<_, Order>(
        "UPDATE orders SET refunded_total = $2, payment_status = $3, status = $4, fulfillment_status = $5, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(refunded_total)
    .bind(payment_status.as_str())
    .bind(status.as_str())
    .bind(fulfillment.as_str())
    .fetch_one(conn)
    .await?)
}
