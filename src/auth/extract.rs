//! Request extractors for signed-in customers and admins.

use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::Utc;

use super::AuthError;
use crate::db::UserRepository;
use crate::domain::aggregates::User;
use crate::error::AppError;
use crate::http::AppState;

/// Any signed-in user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// A signed-in user with the admin role. Rejects with 401, or 403 for customers.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

fn bearer(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts.headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidToken)?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = state.tokens.verify(bearer(parts)?, Utc::now())?;
        let user = UserRepository::new(&state.pool)
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        Ok(Self(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin attempted admin access");
            return Err(AppError::Forbidden("admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/cart");
        if let Some(v) = auth {
            builder = builder.header(AUTHORIZATION, v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert!(matches!(bearer(&parts(None)), Err(AuthError::MissingToken)));
        assert!(matches!(bearer(&parts(Some("Basic xyz"))), Err(AuthError::MissingToken)));
        assert!(matches!(bearer(&parts(Some("Bearer   "))), Err(AuthError::MissingToken)));
    }
}
