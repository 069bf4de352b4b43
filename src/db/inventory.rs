//! Inventory ledger: every stock movement writes a transaction row and
//! updates the variant counters under a row lock.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{Page, Paginated, RepositoryError};
use crate::domain::aggregates::{InventoryError, InventoryTransaction, InventoryTransactionKind, ProductVariant, StockLevel};

#[derive(Debug, thiserror::Error)]
pub enum InventoryWriteError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for InventoryWriteError {
    fn from(err: sqlx::Error) -> Self { Self::Repository(err.into()) }
}

/// One requested stock movement.
#[derive(Debug, Clone)]
pub struct Movement<'m> {
    pub variant_id: Uuid,
    pub kind: InventoryTransactionKind,
    pub quantity: i32,
    pub reference: Option<&'m str>,
    pub note: Option<&'m str>,
    pub actor: Option<Uuid>,
}

pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, movement: &Movement<'_>) -> Result<(InventoryTransaction, ProductVariant), InventoryWriteError> {
        let mut tx = self.pool.begin().await?;
        let result = apply(&mut tx, movement).await?;
        tx.commit().await?;
        Ok(result)
    }

    pub async fn history(&self, variant_id: Option<Uuid>, page: Page) -> Result<Paginated<InventoryTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryTransaction>(
            "SELECT * FROM inventory_transactions WHERE ($1::uuid IS NULL OR variant_id = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(variant_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM inventory_transactions WHERE ($1::uuid IS NULL OR variant_id = $1)")
                .bind(variant_id)
                .fetch_one(self.pool)
                .await?;

        Ok(Paginated::new(rows, total, page))
    }
}

/// Applies a movement inside the caller's transaction.
pub async fn apply(conn: &mut PgConnection, movement: &Movement<'_>) -> Result<(InventoryTransaction, ProductVariant), InventoryWriteError> {
    let current = sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE id = $1 FOR UPDATE")
        .bind(movement.variant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound("variant"))?;

    let next = current.stock_level().apply(movement.kind, movement.quantity)?;

    let variant = update_level(&mut *conn, movement.variant_id, next).await?;

    let entry = sqlx::query_as::<_, InventoryTransaction>(
        "INSERT INTO inventory_transactions (id, variant_id, kind, quantity, reference, note, created_by, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(movement.variant_id)
    .bind(movement.kind.as_str())
    .bind(movement.quantity)
    .bind(movement.reference)
    .bind(movement.note)
    .bind(movement.actor)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(variant_id = %movement.variant_id, kind = %movement.kind, quantity = movement.quantity, "Inventory updated");
    Ok((entry, variant))
}

async fn update_level(conn: &mut PgConnection, variant_id: Uuid, level: StockLevel) -> Result<ProductVariant, RepositoryError> {
    Ok(sqlx::query_as::<_, ProductVariant>(
        "UPDATE product_variants SET stock = $2, reserved_stock = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(variant_id)
    .bind(level.stock)
    .bind(level.reserved)
    .fetch_one(conn)
    .await?)
}
