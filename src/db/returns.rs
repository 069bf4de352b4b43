//! Return requests and the stock / refund bookkeeping they trigger.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::inventory::InventoryWriteError;
use super::orders::{self, OrderWriteError, PutBack};
use super::{Page, Paginated, RepositoryError};
use crate::domain::aggregates::returns::{check_eligibility, validate_items, validate_refund, ReturnItemLine};
use crate::domain::aggregates::{
    InventoryError, InventoryTransactionKind, Order, OrderError, OrderItem, ReturnDetail, ReturnError, ReturnRequest,
    ReturnStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum ReturnWriteError {
    #[error(transparent)]
    Return(#[from] ReturnError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ReturnWriteError {
    fn from(err: sqlx::Error) -> Self { Self::Repository(err.into()) }
}

impl From<InventoryWriteError> for ReturnWriteError {
    fn from(err: InventoryWriteError) -> Self {
        match err {
            InventoryWriteError::Inventory(e) => Self::Inventory(e),
            InventoryWriteError::Repository(e) => Self::Repository(e),
        }
    }
}

impl From<OrderWriteError> for ReturnWriteError {
    fn from(err: OrderWriteError) -> Self {
        match err {
            OrderWriteError::Order(e) => Self::Order(e),
            OrderWriteError::Inventory(e) => Self::Inventory(e),
            OrderWriteError::Repository(e) => Self::Repository(e),
        }
    }
}

/// A customer's return request before validation.
#[derive(Debug, Clone)]
pub struct NewReturn {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub reason: String,
    pub items: Vec<(Uuid, i32)>,
}

const ITEM_QUERY: &str = "SELECT ri.id, ri.order_item_id, oi.variant_id, oi.name, oi.sku, ri.quantity, oi.unit_price \
    FROM return_items ri JOIN order_items oi ON oi.id = ri.order_item_id WHERE ri.return_id = $1 ORDER BY oi.name";

pub struct ReturnRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReturnRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Opens a return after checking the window and per-item quantities
    /// against what earlier returns already claimed.
    pub async fn create(&self, request: &NewReturn, window_days: i64, now: DateTime<Utc>) -> Result<ReturnDetail, ReturnWriteError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut tx, request.order_id).await?;
        if order.user_id != request.user_id {
            return Err(RepositoryError::NotFound("order").into());
        }
        check_eligibility(&order, now, window_days)?;

        let ordered = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .fetch_all(&mut *tx)
            .await?;
        let returned = returned_quantities(&mut tx, order.id).await?;
        validate_items(&request.items, &ordered, &returned)?;

        let created = sqlx::query_as::<_, ReturnRequest>(
            "INSERT INTO returns (id, order_id, user_id, status, reason, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(request.user_id)
        .bind(ReturnStatus::Requested.as_str())
        .bind(&request.reason)
        .fetch_one(&mut *tx)
        .await?;

        for (order_item_id, quantity) in &request.items {
            sqlx::query("INSERT INTO return_items (id, return_id, order_item_id, quantity) VALUES ($1, $2, $3, $4)")
                .bind(Uuid::now_v7())
                .bind(created.id)
                .bind(order_item_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        }

        let items = sqlx::query_as::<_, ReturnItemLine>(ITEM_QUERY).bind(created.id).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(ReturnDetail { request: created, order_number: order.order_number, items })
    }

    pub async fn list(&self, user_id: Option<Uuid>, status: Option<ReturnStatus>, page: Page) -> Result<Paginated<ReturnRequest>, RepositoryError> {
        let status = status.map(|s| s.as_str());
        let filter = "($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR status = $2)";

        let rows = sqlx::query_as::<_, ReturnRequest>(&format!(
            "SELECT * FROM returns WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM returns WHERE {filter}"))
            .bind(user_id)
            .bind(status)
            .fetch_one(self.pool)
            .await?;

        Ok(Paginated::new(rows, total, page))
    }

    /// `user_id` scopes the lookup to one customer; `None` is the back-office view.
    pub async fn detail(&self, id: Uuid, user_id: Option<Uuid>) -> Result<ReturnDetail, RepositoryError> {
        let request = sqlx::query_as::<_, ReturnRequest>("SELECT * FROM returns WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("return"))?;
        let (order_number,): (String,) = sqlx::query_as("SELECT order_number FROM orders WHERE id = $1")
            .bind(request.order_id)
            .fetch_one(self.pool)
            .await?;
        let items = sqlx::query_as::<_, ReturnItemLine>(ITEM_QUERY).bind(id).fetch_all(self.pool).await?;
        Ok(ReturnDetail { request, order_number, items })
    }

    /// Moves a return along its workflow. Receiving the parcel puts the
    /// units back into stock in the same transaction, up to what each
    /// item's sale took out. Refunds go through
    /// [`ReturnRepository::refund`].
    pub async fn update_status(
        &self,
        id: Uuid,
        next: ReturnStatus,
        admin_notes: Option<&str>,
        actor: Uuid,
    ) -> Result<(ReturnRequest, ReturnStatus), ReturnWriteError> {
        if next == ReturnStatus::Refunded {
            return Err(ReturnError::RefundNeedsAmount.into());
        }

        let mut tx = self.pool.begin().await?;
        let current = lock(&mut tx, id).await?;
        current.transition(next)?;

        if next == ReturnStatus::Received {
            let reference = format!("return:{id}");
            let lines = sqlx::query_as::<_, ReturnItemLine>(ITEM_QUERY).bind(id).fetch_all(&mut *tx).await?;
            let ids: Vec<Uuid> = lines.iter().map(|l| l.order_item_id).collect();
            let ordered = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE id = ANY($1) FOR UPDATE")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await?;
            let back = PutBack { kind: InventoryTransactionKind::Return, reference: &reference, note: "return received", actor };
            for line in &lines {
                let Some(item) = ordered.iter().find(|i| i.id == line.order_item_id) else { continue };
                orders::put_back(&mut tx, item, line.quantity, &back).await?;
            }
        }

        let updated = sqlx::query_as::<_, ReturnRequest>(
            "UPDATE returns SET status = $2, admin_notes = COALESCE($3, admin_notes), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(next.as_str())
        .bind(admin_notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((updated, current.status))
    }

    /// Records the refund on both the return and its order.
    pub async fn refund(&self, id: Uuid, amount: Decimal, admin_notes: Option<&str>) -> Result<(ReturnRequest, Order), ReturnWriteError> {
        let mut tx = self.pool.begin().await?;
        let current = lock(&mut tx, id).await?;
        current.transition(ReturnStatus::Refunded)?;

        let items = sqlx::query_as::<_, ReturnItemLine>(ITEM_QUERY).bind(id).fetch_all(&mut *tx).await?;
        let refundable: Decimal = items.iter().map(ReturnItemLine::total).sum();
        validate_refund(amount, refundable)?;

        let order = orders::lock(&mut tx, current.order_id).await?;
        let order = orders::record_refund(&mut tx, &order, amount).await?;

        let updated = sqlx::query_as::<_, ReturnRequest>(
            "UPDATE returns SET status = $2, refund_amount = $3, admin_notes = COALESCE($4, admin_notes), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(ReturnStatus::Refunded.as_str())
        .bind(amount)
        .bind(admin_notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((updated, order))
    }
}

async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<ReturnRequest, RepositoryError> {
    sqlx::query_as::<_, ReturnRequest>("SELECT * FROM returns WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound("return"))
}

/// Units per order item claimed by earlier returns that were not rejected.
async fn returned_quantities(conn: &mut PgConnection, order_id: Uuid) -> Result<HashMap<Uuid, i32>, RepositoryError> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT ri.order_item_id, SUM(ri.quantity)::bigint FROM return_items ri JOIN returns r ON r.id = ri.return_id \
         WHERE r.order_id = $1 AND r.status <> 'rejected' GROUP BY ri.order_item_id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id, qty)| (id, i32::try_from(qty).unwrap_or(i32::MAX))).collect())
}
