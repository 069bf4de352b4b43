use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::validated;
use crate::auth::CurrentUser;
use crate::db::CartRepository;
use crate::domain::aggregates::CartView;
use crate::error::Result;
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub variant_id: Uuid,
    #[validate(range(min = 1, max = 99))]
    pub quantity: u32,
}

/// Zero removes the line.
#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityRequest {
    #[validate(range(max = 99))]
    pub quantity: u32,
}

pub async fn get_cart(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<CartView>> {
    let cart = CartRepository::new(&state.pool).get(user.id).await?;
    Ok(Json(cart.into()))
}

pub async fn add_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let body = validated(body)?;
    let cart = CartRepository::new(&state.pool).add(user.id, body.variant_id, body.quantity).await?;
    Ok(Json(cart.into()))
}

pub async fn set_quantity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(variant_id): Path<Uuid>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let body = validated(body)?;
    let cart = CartRepository::new(&state.pool).set_quantity(user.id, variant_id, body.quantity).await?;
    Ok(Json(cart.into()))
}

pub async fn remove_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(variant_id): Path<Uuid>,
) -> Result<Json<CartView>> {
    let cart = CartRepository::new(&state.pool).remove(user.id, variant_id).await?;
    Ok(Json(cart.into()))
}

pub async fn clear(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<StatusCode> {
    CartRepository::new(&state.pool).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
