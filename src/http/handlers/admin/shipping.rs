//! Shipping zones and their rates.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::shipping::{RateInput, ZoneInput};
use crate::db::ShippingRepository;
use crate::domain::aggregates::shipping::validate_rate;
use crate::domain::aggregates::{RateKind, ShippingRate, ShippingZone};
use crate::error::Result;
use crate::http::handlers::{non_blank, validated};
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ZoneRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1))]
    pub countries: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default = "active")]
    pub is_active: bool,
}

impl From<ZoneRequest> for ZoneInput {
    fn from(r: ZoneRequest) -> Self {
        Self {
            name: r.name.trim().to_string(),
            countries: r.countries.iter().map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty()).collect(),
            states: r.states.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            is_active: r.is_active,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub kind: RateKind,
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
    pub price: Decimal,
    #[validate(length(max = 40))]
    pub estimated_days: Option<String>,
    #[serde(default = "active")]
    pub is_active: bool,
}

impl RateRequest {
    fn into_input(self) -> Result<RateInput> {
        validate_rate(self.kind, self.min_value, self.max_value, self.price)?;
        Ok(RateInput {
            name: self.name.trim().to_string(),
            kind: self.kind,
            min_value: self.min_value,
            max_value: self.max_value,
            price: self.price,
            estimated_days: non_blank(self.estimated_days),
            is_active: self.is_active,
        })
    }
}

fn active() -> bool { true }

#[derive(Debug, Default, Deserialize)]
pub struct RateQuery {
    pub zone_id: Option<Uuid>,
}

pub async fn list_zones(State(state): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<Vec<ShippingZone>>> {
    Ok(Json(ShippingRepository::new(&state.pool).zones(false).await?))
}

pub async fn create_zone(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<ZoneRequest>,
) -> Result<(StatusCode, Json<ShippingZone>)> {
    let input = ZoneInput::from(validated(body)?);
    Ok((StatusCode::CREATED, Json(ShippingRepository::new(&state.pool).create_zone(&input).await?)))
}

pub async fn update_zone(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ZoneRequest>,
) -> Result<Json<ShippingZone>> {
    let input = ZoneInput::from(validated(body)?);
    Ok(Json(ShippingRepository::new(&state.pool).update_zone(id, &input).await?))
}

/// Rates go with the zone.
pub async fn delete_zone(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    ShippingRepository::new(&state.pool).delete_zone(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_rates(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<RateQuery>,
) -> Result<Json<Vec<ShippingRate>>> {
    Ok(Json(ShippingRepository::new(&state.pool).rates(query.zone_id, false).await?))
}

pub async fn create_rate(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(zone_id): Path<Uuid>,
    Json(body): Json<RateRequest>,
) -> Result<(StatusCode, Json<ShippingRate>)> {
    let input = validated(body)?.into_input()?;
    let repo = ShippingRepository::new(&state.pool);
    repo.get_zone(zone_id).await?;
    Ok((StatusCode::CREATED, Json(repo.create_rate(zone_id, &input).await?)))
}

pub async fn get_rate(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<ShippingRate>> {
    Ok(Json(ShippingRepository::new(&state.pool).get_rate(id).await?))
}

pub async fn update_rate(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RateRequest>,
) -> Result<Json<ShippingRate>> {
    let input = validated(body)?.into_input()?;
    Ok(Json(ShippingRepository::new(&state.pool).update_rate(id, &input).await?))
}

pub async fn delete_rate(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    ShippingRepository::new(&state.pool).delete_rate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_request_normalised() {
        let input = ZoneInput::from(ZoneRequest {
            name: " East Malaysia ".into(),
            countries: vec![" my".into(), "".into()],
            states: vec!["Sabah".into(), " Sarawak ".into(), " ".into()],
            is_active: true,
        });
        assert_eq!(input.name, "East Malaysia");
        assert_eq!(input.countries, vec!["MY".to_string()]);
        assert_eq!(input.states, vec!["Sabah".to_string(), "Sarawak".to_string()]);
    }

    #[test]
    fn test_rate_range_checked() {
        let rate = |min: i64, max: i64| RateRequest {
            name: "Heavy parcel".into(),
            kind: RateKind::Weight,
            min_value: Some(Decimal::from(min)),
            max_value: Some(Decimal::from(max)),
            price: Decimal::from(25),
            estimated_days: None,
            is_active: true,
        };
        assert!(rate(2000, 5000).into_input().is_ok());
        assert!(rate(5000, 2000).into_input().is_err());
    }
}
