use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::orders::OrderFilter;
use crate::db::{OrderRepository, Page, Paginated};
use crate::domain::aggregates::{Order, OrderDetail, OrderStatus, PaymentStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::error::Result;
use crate::http::handlers::{non_blank, validated};
use crate::http::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub user_id: Option<Uuid>,
    /// Order number or customer email.
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Paginated<Order>>> {
    let filter = OrderFilter {
        user_id: query.user_id,
        status: query.status,
        payment_status: query.payment_status,
        search: non_blank(query.q),
    };
    let page = Page::new(query.page, query.per_page);
    Ok(Json(OrderRepository::new(&state.pool).list(&filter, page).await?))
}

pub async fn get(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(&state.pool);
    let order = repo.get(id).await?;
    Ok(Json(repo.detail(order).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<OrderDetail>> {
    let body = validated(body)?;
    let tracking = non_blank(body.tracking_number);
    transition(&state, id, body.status, tracking.as_deref(), admin.id).await
}

/// Shorthand for moving to `cancelled`; stock is put back.
pub async fn cancel(State(state): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> Result<Json<OrderDetail>> {
    transition(&state, id, OrderStatus::Cancelled, None, admin.id).await
}

async fn transition(state: &AppState, id: Uuid, next: OrderStatus, tracking: Option<&str>, actor: Uuid) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(&state.pool);
    let (order, change) = repo.update_status(id, next, tracking, actor).await?;
    tracing::info!(
        order_number = %order.order_number,
        from = %change.from,
        to = %change.to,
        restocked = change.restock,
        "Order status updated"
    );

    state
        .events
        .publish(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            from: change.from,
            to: change.to,
        }))
        .await;
    Ok(Json(repo.detail(order).await?))
}
