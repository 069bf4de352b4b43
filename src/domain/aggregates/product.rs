//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::catalog::Category;
use super::inventory::StockLevel;

text_enum! {
    /// Only `Active` products are visible on the storefront.
    ProductStatus { Draft => "draft", Active => "active", Archived => "archived" }
}

impl Default for ProductStatus {
    fn default() -> Self { Self::Draft }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: ProductStatus,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub weight_grams: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_visible(&self) -> bool { self.status == ProductStatus::Active }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    /// Overrides the product price when set.
    pub price: Option<Decimal>,
    pub stock: i32,
    pub reserved_stock: i32,
    pub weight_grams: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    pub fn effective_price(&self, product_price: Decimal) -> Decimal { self.price.unwrap_or(product_price) }
    pub fn effective_weight(&self, product_weight: i32) -> i32 { self.weight_grams.unwrap_or(product_weight) }
    pub fn stock_level(&self) -> StockLevel { StockLevel { stock: self.stock, reserved: self.reserved_stock } }
    pub fn available(&self) -> i32 { self.stock_level().available() }

    /// Human readable option label, e.g. `M / Emerald`.
    pub fn label(&self) -> Option<String> {
        let parts: Vec<&str> = [self.size.as_deref(), self.color.as_deref()].into_iter().flatten().collect();
        if parts.is_empty() { None } else { Some(parts.join(" / ")) }
    }
}

/// Product with everything the product page and the admin editor need.
#[derive(Clone, Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub variants: Vec<ProductVariant>,
    pub collection_ids: Vec<Uuid>,
}

/// Checks the pricing fields an admin submits for a product.
pub fn validate_pricing(price: Decimal, compare_at_price: Option<Decimal>) -> Result<(), ProductError> {
    if price.is_sign_negative() { return Err(ProductError::NegativePrice); }
    if let Some(compare) = compare_at_price {
        if compare <= price { return Err(ProductError::CompareAtNotHigher); }
    }
    Ok(())
}

/// A product may only go live once it can actually be bought.
pub fn ensure_publishable(status: ProductStatus, price: Decimal, variant_count: usize) -> Result<(), ProductError> {
    if status != ProductStatus::Active { return Ok(()); }
    if variant_count == 0 { return Err(ProductError::NoVariants); }
    if price.is_zero() { return Err(ProductError::ZeroPrice); }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("price must not be negative")]
    NegativePrice,
    #[error("compare-at price must be higher than the price")]
    CompareAtNotHigher,
    #[error("an active product needs at least one variant")]
    NoVariants,
    #[error("an active product needs a non-zero price")]
    ZeroPrice,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(stock: i32, reserved: i32) -> ProductVariant {
        ProductVariant {
            id: Uuid::new_v4(), product_id: Uuid::new_v4(), sku: "BW-001".into(),
            size: Some("M".into()), color: Some("Emerald".into()), price: None,
            stock, reserved_stock: reserved, weight_grams: None,
            created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variant_price_and_weight_fallback() {
        let mut v = variant(5, 0);
        assert_eq!(v.effective_price(Decimal::new(15900, 2)), Decimal::new(15900, 2));
        assert_eq!(v.effective_weight(450), 450);
        v.price = Some(Decimal::new(17900, 2));
        v.weight_grams = Some(500);
        assert_eq!(v.effective_price(Decimal::new(15900, 2)), Decimal::new(17900, 2));
        assert_eq!(v.effective_weight(450), 500);
    }

    #[test]
    fn test_available_excludes_reserved() {
        assert_eq!(variant(10, 3).available(), 7);
        assert_eq!(variant(2, 2).available(), 0);
    }

    #[test]
    fn test_variant_label() {
        assert_eq!(variant(1, 0).label().as_deref(), Some("M / Emerald"));
        let mut v = variant(1, 0);
        v.size = None;
        v.color = None;
        assert_eq!(v.label(), None);
    }

    #[test]
    fn test_pricing_rules() {
        assert!(validate_pricing(Decimal::new(100, 0), None).is_ok());
        assert!(validate_pricing(Decimal::new(100, 0), Some(Decimal::new(120, 0))).is_ok());
        assert_eq!(validate_pricing(Decimal::new(100, 0), Some(Decimal::new(100, 0))), Err(ProductError::CompareAtNotHigher));
        assert_eq!(validate_pricing(Decimal::new(-1, 0), None), Err(ProductError::NegativePrice));
    }

    #[test]
    fn test_publish_requires_variants() {
        assert_eq!(ensure_publishable(ProductStatus::Active, Decimal::new(100, 0), 0), Err(ProductError::NoVariants));
        assert!(ensure_publishable(ProductStatus::Draft, Decimal::ZERO, 0).is_ok());
        assert!(ensure_publishable(ProductStatus::Active, Decimal::new(100, 0), 2).is_ok());
    }

    #[test]
    fn test_status_round_trips_text() {
        for status in ProductStatus::ALL {
            assert_eq!(status.as_str().parse::<ProductStatus>().unwrap(), *status);
        }
        assert!("deleted".parse::<ProductStatus>().is_err());
    }
}
