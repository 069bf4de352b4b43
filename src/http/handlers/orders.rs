use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::orders::OrderFilter;
use crate::db::{OrderRepository, Page, Paginated};
use crate::domain::aggregates::{Order, OrderDetail, OrderStatus};
use crate::error::Result;
use crate::http::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MyOrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<MyOrdersQuery>,
) -> Result<Json<Paginated<Order>>> {
    let filter = OrderFilter { user_id: Some(user.id), status: query.status, ..OrderFilter::default() };
    let page = Page::new(query.page, query.per_page);
    Ok(Json(OrderRepository::new(&state.pool).list(&filter, page).await?))
}

pub async fn get(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<Uuid>) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(&state.pool);
    let order = repo.get_for_user(user.id, id).await?;
    Ok(Json(repo.detail(order).await?))
}
