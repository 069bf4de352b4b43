//! Customer address book.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::address::{becomes_default, successor_default};
use crate::domain::aggregates::Address;

#[derive(Debug, Clone)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub is_default: bool,
}

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Address>, RepositoryError> {
        Ok(sqlx::query_as::<_, Address>(
            "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Scoped to the owner; another user's address reads as not found.
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Address, RepositoryError> {
        sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("address"))
    }

    /// The first address a user saves becomes their default.
    pub async fn create(&self, user_id: Uuid, input: &AddressInput) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent writes to the same address book.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE").bind(user_id).execute(&mut *tx).await?;

        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM addresses WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let is_default = becomes_default(input.is_default, existing);
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(
            "INSERT INTO addresses (id, user_id, full_name, phone, line1, line2, city, state, postcode, country, is_default, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postcode)
        .bind(&input.country)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Updating with `is_default = false` never un-defaults an address; use another address's default flag instead.
    pub async fn update(&self, user_id: Uuid, id: Uuid, input: &AddressInput) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(
            "UPDATE addresses SET full_name = $3, phone = $4, line1 = $5, line2 = $6, city = $7, state = $8, postcode = $9, \
             country = $10, is_default = is_default OR $11, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postcode)
        .bind(&input.country)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("address"))?;

        tx.commit().await?;
        Ok(address)
    }

    pub async fn set_default(&self, user_id: Uuid, id: Uuid) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user_id).await?;

        let address = sqlx::query_as::<_, Address>(
            "UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("address"))?;

        tx.commit().await?;
        Ok(address)
    }

    /// Deleting the default promotes the most recently added remaining address.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query_as::<_, Address>("DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING *")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound("address"))?;

        if removed.is_default {
            let remaining = sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;
            if let Some(next) = successor_default(&remaining) {
                sqlx::query("UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = $1")
                    .bind(next)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(conn: &mut PgConnection, user_id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE addresses SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
