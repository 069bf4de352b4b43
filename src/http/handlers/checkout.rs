//! Checkout: quote, open a gateway payment, confirm a Curlec payment.
//!
//! Stripe orders are created by the webhook only; Curlec orders may also be
//! confirmed from the client callback. Both paths go through
//! [`CheckoutService::finalize`](crate::services::CheckoutService::finalize),
//! which makes the second arrival a no-op.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validated;
use crate::auth::CurrentUser;
use crate::db::OrderRepository;
use crate::domain::aggregates::{OrderDetail, User};
use crate::error::{AppError, Result};
use crate::http::AppState;
use crate::payments::{PaymentGateway, PaymentSession};
use crate::services::Quote;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: Uuid,
    pub shipping_rate_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutStarted {
    pub quote: Quote,
    pub payment: PaymentSession,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CurlecVerifyRequest {
    #[validate(length(min = 1, max = 64))]
    pub order_id: String,
    #[validate(length(min = 1, max = 64))]
    pub payment_id: String,
    #[validate(length(min = 1, max = 128))]
    pub signature: String,
}

pub async fn quote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<Quote>> {
    Ok(Json(state.checkout().quote(user.id, body.address_id, body.shipping_rate_id).await?))
}

pub async fn start_stripe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutStarted>> {
    start(&state, state.stripe()?, &user, body).await
}

pub async fn start_curlec(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutStarted>> {
    start(&state, state.curlec()?, &user, body).await
}

async fn start(
    state: &AppState,
    gateway: &dyn PaymentGateway,
    user: &User,
    body: CheckoutRequest,
) -> Result<Json<CheckoutStarted>> {
    let (quote, payment) = state.checkout().start(gateway, user, body.address_id, body.shipping_rate_id).await?;
    Ok(Json(CheckoutStarted { quote, payment }))
}

/// Confirms the payment the Curlec widget reports and returns the order.
pub async fn verify_curlec(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CurlecVerifyRequest>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let body = validated(body)?;
    let paid = state.curlec()?.verify_payment(&body.order_id, &body.payment_id, &body.signature).await?;
    if paid.metadata.user_id != user.id {
        tracing::warn!(user_id = %user.id, reference = %paid.reference, "Payment belongs to another customer");
        return Err(AppError::Forbidden("payment belongs to another customer".to_string()));
    }

    let finalized = state.checkout().finalize(&paid).await?;
    let detail = OrderRepository::new(&state.pool).detail(finalized.order).await?;
    let status = if finalized.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(detail)))
}
