use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{non_blank, validated};
use crate::auth::CurrentUser;
use crate::db::addresses::AddressInput;
use crate::db::AddressRepository;
use crate::domain::aggregates::address::normalize_country;
use crate::domain::aggregates::Address;
use crate::error::Result;
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 3, max = 10))]
    pub postcode: String,
    #[validate(length(equal = 2))]
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl From<AddressRequest> for AddressInput {
    fn from(r: AddressRequest) -> Self {
        Self {
            country: normalize_country(r.country.as_deref()),
            full_name: r.full_name.trim().to_string(),
            phone: r.phone.trim().to_string(),
            line1: r.line1.trim().to_string(),
            line2: non_blank(r.line2),
            city: r.city.trim().to_string(),
            state: r.state.trim().to_string(),
            postcode: r.postcode.trim().to_string(),
            is_default: r.is_default,
        }
    }
}

pub async fn list(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressRepository::new(&state.pool).list(user.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddressRequest>,
) -> Result<(StatusCode, Json<Address>)> {
    let input = AddressInput::from(validated(body)?);
    let address = AddressRepository::new(&state.pool).create(user.id, &input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddressRequest>,
) -> Result<Json<Address>> {
    let input = AddressInput::from(validated(body)?);
    Ok(Json(AddressRepository::new(&state.pool).update(user.id, id, &input).await?))
}

pub async fn set_default(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<Uuid>) -> Result<Json<Address>> {
    Ok(Json(AddressRepository::new(&state.pool).set_default(user.id, id).await?))
}

pub async fn delete(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    AddressRepository::new(&state.pool).delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(country: Option<&str>) -> AddressRequest {
        AddressRequest {
            full_name: " Nur Aisyah ".into(),
            phone: "+60123456789".into(),
            line1: "12 Jalan Ampang".into(),
            line2: Some("  ".into()),
            city: "Kuala Lumpur".into(),
            state: "WP Kuala Lumpur".into(),
            postcode: "50450".into(),
            country: country.map(str::to_string),
            is_default: false,
        }
    }

    #[test]
    fn test_request_normalised() {
        let input = AddressInput::from(request(None));
        assert_eq!(input.full_name, "Nur Aisyah");
        assert_eq!(input.line2, None);
        assert_eq!(input.country, "MY");
        assert_eq!(AddressInput::from(request(Some("sg"))).country, "SG");
    }

    #[test]
    fn test_validation_rules() {
        assert!(request(Some("MY")).validate().is_ok());
        assert!(request(Some("MYS")).validate().is_err());
        let mut short = request(None);
        short.postcode = "5".into();
        assert!(short.validate().is_err());
    }
}
