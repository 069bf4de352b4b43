use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validated;
use crate::auth::{AuthService, CurrentUser, IssuedToken};
use crate::domain::aggregates::User;
use crate::error::Result;
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 256))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthResponse {
    fn new(user: User, issued: IssuedToken) -> Self {
        Self { user, token: issued.token, expires_at: issued.expires_at }
    }
}

pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> Result<(StatusCode, Json<AuthResponse>)> {
    let body = validated(body)?;
    let (user, token) = AuthService::new(&state.pool, &state.tokens).register(&body.email, &body.name, &body.password).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, token))))
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Json<AuthResponse>> {
    let body = validated(body)?;
    let (user, token) = AuthService::new(&state.pool, &state.tokens).login(&body.email, &body.password).await?;
    tracing::debug!(user_id = %user.id, "Login");
    Ok(Json(AuthResponse::new(user, token)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
