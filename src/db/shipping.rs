//! Shipping zone and rate repository.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{RateKind, ShippingRate, ShippingZone};

#[derive(Debug, Clone)]
pub struct ZoneInput {
    pub name: String,
    pub countries: Vec<String>,
    pub states: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct RateInput {
    pub name: String,
    pub kind: RateKind,
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
    pub price: Decimal,
    pub estimated_days: Option<String>,
    pub is_active: bool,
}

pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn zones(&self, active_only: bool) -> Result<Vec<ShippingZone>, RepositoryError> {
        Ok(sqlx::query_as::<_, ShippingZone>("SELECT * FROM shipping_zones WHERE (NOT $1 OR is_active) ORDER BY name")
            .bind(active_only)
            .fetch_all(self.pool)
            .await?)
    }

    pub async fn rates(&self, zone_id: Option<Uuid>, active_only: bool) -> Result<Vec<ShippingRate>, RepositoryError> {
        Ok(sqlx::query_as::<_, ShippingRate>(
            "SELECT * FROM shipping_rates WHERE ($1::uuid IS NULL OR zone_id = $1) AND (NOT $2 OR is_active) \
             ORDER BY price, name",
        )
        .bind(zone_id)
        .bind(active_only)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn get_zone(&self, id: Uuid) -> Result<ShippingZone, RepositoryError> {
        sqlx::query_as::<_, ShippingZone>("SELECT * FROM shipping_zones WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("shipping zone"))
    }

    pub async fn create_zone(&self, input: &ZoneInput) -> Result<ShippingZone, RepositoryError> {
        Ok(sqlx::query_as::<_, ShippingZone>(
            "INSERT INTO shipping_zones (id, name, countries, states, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.countries)
        .bind(&input.states)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?)
    }

    pub async fn update_zone(&self, id: Uuid, input: &ZoneInput) -> Result<ShippingZone, RepositoryError> {
        sqlx::query_as::<_, ShippingZone>(
            "UPDATE shipping_zones SET name = $2, countries = $3, states = $4, is_active = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.countries)
        .bind(&input.states)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("shipping zone"))
    }

    /// Removes the zone together with its rates.
    pub async fn delete_zone(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM shipping_zones WHERE id = $1").bind(id).execute(self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("shipping zone")); }
        Ok(())
    }

    pub async fn get_rate(&self, id: Uuid) -> Result<ShippingRate, RepositoryError> {
        sqlx::query_as::<_, ShippingRate>("SELECT * FROM shipping_rates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("shipping rate"))
    }

    pub async fn create_rate(&self, zone_id: Uuid, input: &RateInput) -> Result<ShippingRate, RepositoryError> {
        Ok(sqlx::query_as::<_, ShippingRate>(
            "INSERT INTO shipping_rates (id, zone_id, name, kind, min_value, max_value, price, estimated_days, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(zone_id)
        .bind(&input.name)
        .bind(input.kind.as_str())
        .bind(input.min_value)
        .bind(input.max_value)
        .bind(input.price)
        .bind(&input.estimated_days)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?)
    }

    pub async fn update_rate(&self, id: Uuid, input: &RateInput) -> Result<ShippingRate, RepositoryError> {
        sqlx::query_as::<_, ShippingRate>(
            "UPDATE shipping_rates SET name = $2, kind = $3, min_value = $4, max_value = $5, price = $6, \
             estimated_days = $7, is_active = $8, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.kind.as_str())
        .bind(input.min_value)
        .bind(input.max_value)
        .bind(input.price)
        .bind(&input.estimated_days)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("shipping rate"))
    }

    pub async fn delete_rate(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM shipping_rates WHERE id = $1").bind(id).execute(self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("shipping rate")); }
        Ok(())
    }
}
