//! Key/value store behind [`StoreSettings`].

use std::collections::HashMap;

use serde_json::Value;
use sqlx::PgPool;

use super::RepositoryError;
use crate::domain::aggregates::StoreSettings;

pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> Result<HashMap<String, Value>, RepositoryError> {
        let rows: Vec<(String, sqlx::types::Json<Value>)> =
            sqlx::query_as("SELECT key, value FROM system_settings ORDER BY key").fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(|(k, v)| (k, v.0)).collect())
    }

    pub async fn load(&self) -> Result<StoreSettings, RepositoryError> {
        Ok(StoreSettings::from_pairs(&self.all().await?))
    }

    /// Writes several keys in one transaction.
    pub async fn upsert(&self, values: &HashMap<String, Value>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                "INSERT INTO system_settings (key, value, updated_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(key)
            .bind(sqlx::types::Json(value))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
