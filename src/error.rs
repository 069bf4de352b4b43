//! Unified error handling for route handlers.
//!
//! All handlers return `Result<T, AppError>`; the response body is
//! `{ "code": ..., "message": ..., "details": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::db::carts::CartWriteError;
use crate::db::inventory::InventoryWriteError;
use crate::db::orders::OrderWriteError;
use crate::db::returns::ReturnWriteError;
use crate::db::RepositoryError;
use crate::domain::aggregates::{
    CartError, CatalogError, InventoryError, MediaError, OrderError, ProductError, ReturnError, SettingsError,
    ShippingError,
};
use crate::domain::value_objects::{MoneyError, SkuError, SlugError};
use crate::payments::PaymentError;
use crate::services::media::StorageError;

/// API error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }
    pub fn bad_request(msg: impl std::fmt::Display) -> Self { Self::BadRequest(msg.to_string()) }
    pub fn internal(msg: impl std::fmt::Display) -> Self { Self::Internal(msg.to_string()) }

    /// True for failures a webhook sender should retry: server-side faults
    /// and unique-key races, which resolve on the next attempt.
    pub fn is_retryable(&self) -> bool {
        self.status().is_server_error() || matches!(self, Self::Database(RepositoryError::Conflict(_)))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(PaymentError::InvalidSignature(_) | PaymentError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
            Self::Payment(PaymentError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Payment(PaymentError::NotCaptured(_)) => StatusCode::CONFLICT,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(AuthError::EmailTaken) => StatusCode::CONFLICT,
            Self::Auth(AuthError::WeakPassword) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::Hashing(_) | AuthError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::CONFLICT => "CONFLICT",
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            StatusCode::FORBIDDEN => "FORBIDDEN",
            StatusCode::UNPROCESSABLE_ENTITY => "VALIDATION_ERROR",
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            StatusCode::BAD_GATEWAY => "PAYMENT_ERROR",
            StatusCode::SERVICE_UNAVAILABLE => "UNAVAILABLE",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request error");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(RepositoryError::NotFound(what)) => format!("{what} not found"),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payment(PaymentError::InvalidSignature(_)) => "Invalid signature".to_string(),
            Self::Payment(PaymentError::NotConfigured(gateway)) => format!("{gateway} payments are not enabled"),
            Self::Payment(PaymentError::InvalidPayload(msg)) => msg.clone(),
            Self::Payment(PaymentError::NotCaptured(_)) => "Payment has not been captured yet".to_string(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::Auth(AuthError::Hashing(_) | AuthError::Repository(_)) => "Internal server error".to_string(),
            Self::Auth(err) => err.to_string(),
            Self::Validation(_) => "Validation failed".to_string(),
            Self::NotFound(msg) => format!("{msg} not found"),
            Self::BadRequest(msg) | Self::Conflict(msg) | Self::Unauthorized(msg) | Self::Forbidden(msg) => msg.clone(),
        };

        let details = match &self {
            Self::Validation(errors) => serde_json::to_value(errors.field_errors()).ok(),
            _ => None,
        };

        (status, Json(ApiError { code: self.code(), message, details })).into_response()
    }
}

macro_rules! bad_request_from {
    ($($err:ty),+ $(,)?) => {
        $(impl From<$err> for AppError {
            fn from(err: $err) -> Self { AppError::BadRequest(err.to_string()) }
        })+
    };
}

bad_request_from!(
    CartError, CatalogError, MediaError, ProductError, ReturnError, SettingsError, ShippingError, SkuError, SlugError, MoneyError,
);

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock { .. } | InventoryError::InsufficientReserved { .. } => AppError::Conflict(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } | OrderError::NotPaid => AppError::Conflict(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<CartWriteError> for AppError {
    fn from(err: CartWriteError) -> Self {
        match err {
            CartWriteError::Cart(e) => e.into(),
            CartWriteError::Repository(e) => e.into(),
        }
    }
}

impl From<InventoryWriteError> for AppError {
    fn from(err: InventoryWriteError) -> Self {
        match err {
            InventoryWriteError::Inventory(e) => e.into(),
            InventoryWriteError::Repository(e) => e.into(),
        }
    }
}

impl From<OrderWriteError> for AppError {
    fn from(err: OrderWriteError) -> Self {
        match err {
            OrderWriteError::Order(e) => e.into(),
            OrderWriteError::Inventory(e) => e.into(),
            OrderWriteError::Repository(e) => e.into(),
        }
    }
}

impl From<ReturnWriteError> for AppError {
    fn from(err: ReturnWriteError) -> Self {
        match err {
            ReturnWriteError::Return(e) => e.into(),
            ReturnWriteError::Order(e) => e.into(),
            ReturnWriteError::Inventory(e) => e.into(),
            ReturnWriteError::Repository(e) => e.into(),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Rejected(e) => e.into(),
            StorageError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self { AppError::Database(RepositoryError::from(err)) }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn status_of(err: AppError) -> StatusCode { err.into_response().status() }

    #[test]
    fn test_app_error_display() {
        assert_eq!(AppError::not_found("product").to_string(), "Not found: product");
        assert_eq!(AppError::bad_request("invalid input").to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(AppError::not_found("order")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::internal("boom")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(RepositoryError::Conflict("slug taken".into()).into()), StatusCode::CONFLICT);
        assert_eq!(status_of(RepositoryError::NotFound("cart").into()), StatusCode::NOT_FOUND);
        assert_eq!(status_of(PaymentError::InvalidSignature("bad".into()).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(PaymentError::NotConfigured("stripe").into()), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(PaymentError::NotCaptured("order_1".into()).into()), StatusCode::CONFLICT);
        assert_eq!(status_of(AuthError::InvalidCredentials.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::EmailTaken.into()), StatusCode::CONFLICT);
        assert_eq!(status_of(AuthError::WeakPassword.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AuthError::TokenExpired.into()), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_domain_errors_map() {
        let stock = InventoryError::InsufficientStock { available: 1, requested: 2 };
        assert_eq!(status_of(stock.into()), StatusCode::CONFLICT);
        assert_eq!(status_of(CartError::Empty.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(OrderError::NotPaid.into()), StatusCode::CONFLICT);
        let write = ReturnWriteError::Inventory(InventoryError::InsufficientReserved { reserved: 0, requested: 1 });
        assert_eq!(status_of(write.into()), StatusCode::CONFLICT);
        assert_eq!(status_of(CartWriteError::Repository(RepositoryError::NotFound("variant")).into()), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::from(RepositoryError::Conflict("orders_order_number_key already exists".into())).is_retryable());
        assert!(AppError::internal("pool timed out").is_retryable());
        assert!(!AppError::from(PaymentError::InvalidPayload("no order id".into())).is_retryable());
        assert!(!AppError::not_found("customer").is_retryable());
        assert!(!AppError::from(CartError::Empty).is_retryable());
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
    }

    #[tokio::test]
    async fn test_validation_errors_expose_fields() {
        let errors = Signup { email: "nope".into() }.validate().unwrap_err();
        let response = AppError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json["details"]["email"].is_array());
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::internal("connection refused to 10.0.0.5").into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal server error");
    }
}
