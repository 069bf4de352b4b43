use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::db::{Page, Paginated, UserRepository};
use crate::domain::aggregates::{User, UserRole};
use crate::error::Result;
use crate::http::handlers::non_blank;
use crate::http::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    /// Matches name or email.
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Paginated<User>>> {
    let search = non_blank(query.q);
    let page = Page::new(query.page, query.per_page);
    Ok(Json(UserRepository::new(&state.pool).list(Some(UserRole::Customer), search.as_deref(), page).await?))
}
