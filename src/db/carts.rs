//! Persistent per-user carts.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::cart::{ensure_within_stock, merged_quantity};
use crate::domain::aggregates::{Cart, CartError, CartLine};

const LINE_QUERY: &str = "SELECT ci.id AS item_id, v.id AS variant_id, p.id AS product_id, p.name AS product_name, \
        p.slug AS product_slug, p.status AS product_status, v.sku, v.size, v.color, p.images[1] AS image, \
        COALESCE(v.price, p.price) AS unit_price, ci.quantity, \
        GREATEST(v.stock - v.reserved_stock, 0) AS available, \
        COALESCE(v.weight_grams, p.weight_grams) AS weight_grams \
    FROM cart_items ci \
    JOIN product_variants v ON v.id = ci.variant_id \
    JOIN products p ON p.id = v.product_id \
    WHERE ci.cart_id = $1 \
    ORDER BY ci.created_at";

/// Errors from cart mutations: either a rule on the cart or the database.
#[derive(Debug, thiserror::Error)]
pub enum CartWriteError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartWriteError {
    fn from(err: sqlx::Error) -> Self { Self::Repository(err.into()) }
}

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Returns the user's cart, creating an empty one on first use.
    pub async fn get(&self, user_id: Uuid) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, user_id).await
    }

    /// Adds `quantity` of a variant, merging with an existing line.
    pub async fn add(&self, user_id: Uuid, variant_id: Uuid, quantity: u32) -> Result<Cart, CartWriteError> {
        let mut tx = self.pool.begin().await?;
        let cart_id = ensure_cart(&mut tx, user_id).await?;
        let (sku, status, available) = variant_stock(&mut tx, variant_id).await?;

        if status != "active" {
            return Err(CartError::Unavailable { sku }.into());
        }

        let existing: Option<(i32,)> = sqlx::query_as("SELECT quantity FROM cart_items WHERE cart_id = $1 AND variant_id = $2 FOR UPDATE")
            .bind(cart_id)
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await?;
        let existing = existing.map(|(q,)| q.max(0) as u32);
        let total = merged_quantity(existing, quantity, available, &sku)?;

        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, variant_id, quantity, created_at) VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (cart_id, variant_id) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(Uuid::now_v7())
        .bind(cart_id)
        .bind(variant_id)
        .bind(i32::try_from(total).map_err(|_| CartError::InvalidQuantity)?)
        .execute(&mut *tx)
        .await?;

        touch(&mut tx, cart_id).await?;
        let cart = load(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Sets a line's quantity; zero removes the line.
    pub async fn set_quantity(&self, user_id: Uuid, variant_id: Uuid, quantity: u32) -> Result<Cart, CartWriteError> {
        if quantity == 0 {
            return self.remove(user_id, variant_id).await;
        }

        let mut tx = self.pool.begin().await?;
        let cart_id = ensure_cart(&mut tx, user_id).await?;
        let (sku, _, available) = variant_stock(&mut tx, variant_id).await?;
        ensure_within_stock(quantity, available, &sku)?;

        let updated = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND variant_id = $2")
            .bind(cart_id)
            .bind(variant_id)
            .bind(i32::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(CartError::ItemNotFound.into());
        }

        touch(&mut tx, cart_id).await?;
        let cart = load(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    pub async fn remove(&self, user_id: Uuid, variant_id: Uuid) -> Result<Cart, CartWriteError> {
        let mut tx = self.pool.begin().await?;
        let cart_id = ensure_cart(&mut tx, user_id).await?;

        let removed = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND variant_id = $2")
            .bind(cart_id)
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(CartError::ItemNotFound.into());
        }

        touch(&mut tx, cart_id).await?;
        let cart = load(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_in(&mut conn, user_id).await
    }
}

/// Loads the cart lines on an existing connection or transaction.
pub async fn load(conn: &mut PgConnection, user_id: Uuid) -> Result<Cart, RepositoryError> {
    let cart_id = ensure_cart(conn, user_id).await?;
    let lines = sqlx::query_as::<_, CartLine>(LINE_QUERY).bind(cart_id).fetch_all(&mut *conn).await?;
    Ok(Cart { id: cart_id, user_id, lines })
}

/// Empties the cart inside the caller's transaction.
pub async fn clear_in(conn: &mut PgConnection, user_id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn ensure_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<Uuid, RepositoryError> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES ($1, $2, NOW(), NOW()) \
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

async fn variant_stock(conn: &mut PgConnection, variant_id: Uuid) -> Result<(String, String, i32), RepositoryError> {
    sqlx::query_as(
        "SELECT v.sku, p.status, GREATEST(v.stock - v.reserved_stock, 0) \
         FROM product_variants v JOIN products p ON p.id = v.product_id WHERE v.id = $1",
    )
    .bind(variant_id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound("variant"))
}

async fn touch(conn: &mut PgConnection, cart_id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1").bind(cart_id).execute(conn).await?;
    Ok(())
}
