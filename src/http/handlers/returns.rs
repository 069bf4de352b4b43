use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{validated, PageQuery};
use crate::auth::CurrentUser;
use crate::db::returns::NewReturn;
use crate::db::{Paginated, ReturnRepository, SettingsRepository};
use crate::domain::aggregates::{ReturnDetail, ReturnRequest};
use crate::error::Result;
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnItemRequest {
    pub order_item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReturnRequest {
    pub order_id: Uuid,
    #[validate(length(min = 3, max = 1000))]
    pub reason: String,
    #[validate]
    pub items: Vec<ReturnItemRequest>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<ReturnRequest>>> {
    Ok(Json(ReturnRepository::new(&state.pool).list(Some(user.id), None, query.page()).await?))
}

pub async fn get(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<Uuid>) -> Result<Json<ReturnDetail>> {
    Ok(Json(ReturnRepository::new(&state.pool).detail(id, Some(user.id)).await?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateReturnRequest>,
) -> Result<(StatusCode, Json<ReturnDetail>)> {
    let body = validated(body)?;
    let window = SettingsRepository::new(&state.pool).load().await?.return_window_days;
    let request = NewReturn {
        user_id: user.id,
        order_id: body.order_id,
        reason: body.reason.trim().to_string(),
        items: body.items.iter().map(|i| (i.order_item_id, i.quantity)).collect(),
    };

    let detail = ReturnRepository::new(&state.pool).create(&request, window, Utc::now()).await?;
    tracing::info!(return_id = %detail.request.id, order_number = %detail.order_number, "Return requested");
    Ok((StatusCode::CREATED, Json(detail)))
}
