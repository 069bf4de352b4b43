//! Route handlers, grouped by audience.

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod returns;
pub mod webhooks;

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::db::Page;
use crate::error::Result;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") }))
}

/// `?page=&per_page=` for lists without other filters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page { Page::new(self.page, self.per_page) }
}

/// Runs `validator` rules on a request body.
pub(crate) fn validated<T: Validate>(body: T) -> Result<T> {
    body.validate()?;
    Ok(body)
}

/// Trims an optional text field, treating blank as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Songket ".into())), Some("Songket".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
