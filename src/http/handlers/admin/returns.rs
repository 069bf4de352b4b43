//! Return review, receipt and refund.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::{OrderRepository, Page, Paginated, ReturnRepository};
use crate::domain::aggregates::{ReturnDetail, ReturnRequest, ReturnStatus};
use crate::domain::events::{DomainEvent, ReturnEvent};
use crate::error::Result;
use crate::http::handlers::{non_blank, validated};
use crate::http::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReturnQuery {
    pub status: Option<ReturnStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnStatusRequest {
    pub status: ReturnStatus,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    pub amount: Decimal,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ReturnQuery>,
) -> Result<Json<Paginated<ReturnRequest>>> {
    let page = Page::new(query.page, query.per_page);
    Ok(Json(ReturnRepository::new(&state.pool).list(None, query.status, page).await?))
}

pub async fn get(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<ReturnDetail>> {
    Ok(Json(ReturnRepository::new(&state.pool).detail(id, None).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReturnStatusRequest>,
) -> Result<Json<ReturnDetail>> {
    let body = validated(body)?;
    let notes = non_blank(body.admin_notes);
    let repo = ReturnRepository::new(&state.pool);
    let (request, previous) = repo.update_status(id, body.status, notes.as_deref(), admin.id).await?;
    tracing::info!(return_id = %id, from = %previous, to = %request.status, "Return status updated");

    notify(&state, &request, previous).await?;
    Ok(Json(repo.detail(id, None).await?))
}

/// Records the refund against the return and its order. Money moves in
/// the gateway dashboard.
pub async fn refund(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RefundRequest>,
) -> Result<Json<ReturnDetail>> {
    let body = validated(body)?;
    let notes = non_blank(body.admin_notes);
    let repo = ReturnRepository::new(&state.pool);
    let previous = repo.detail(id, None).await?.request.status;
    let (request, order) = repo.refund(id, body.amount, notes.as_deref()).await?;
    tracing::info!(
        return_id = %id,
        order_number = %order.order_number,
        amount = %body.amount,
        refunded_total = %order.refunded_total,
        "Return refunded"
    );

    notify(&state, &request, previous).await?;
    Ok(Json(repo.detail(id, None).await?))
}

async fn notify(state: &AppState, request: &ReturnRequest, previous: ReturnStatus) -> Result<()> {
    state
        .events
        .publish(DomainEvent::Return(ReturnEvent::StatusChanged {
            return_id: request.id,
            order_id: request.order_id,
            from: previous,
            to: request.status,
        }))
        .await;

    let order = OrderRepository::new(&state.pool).get(request.order_id).await?;
    state.mailer.send_later(state.mailer.return_update(&order.email, &order.order_number, request));
    Ok(())
}
