//! Cart Aggregate

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::product::ProductStatus;
use crate::domain::value_objects::{Money, Quantity, DEFAULT_CURRENCY};

/// A cart row joined with its variant and product, priced at current prices.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub item_id: Uuid,
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    #[sqlx(try_from = "String")]
    pub product_status: ProductStatus,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub available: i32,
    pub weight_grams: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Money { Money::myr(self.unit_price).multiply(self.quantity.max(0) as u32) }
    pub fn line_weight(&self) -> i64 { i64::from(self.weight_grams) * i64::from(self.quantity) }
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn item_count(&self) -> i64 { self.lines.iter().map(|l| i64::from(l.quantity)).sum() }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().fold(Money::zero(DEFAULT_CURRENCY), |acc, l| acc.add(&l.line_total()).unwrap_or(acc))
    }

    pub fn total_weight_grams(&self) -> i64 { self.lines.iter().map(CartLine::line_weight).sum() }

    /// Every line must still be purchasable in the requested quantity.
    pub fn ensure_purchasable(&self) -> Result<(), CartError> {
        if self.is_empty() { return Err(CartError::Empty); }
        for line in &self.lines {
            if line.product_status != ProductStatus::Active {
                return Err(CartError::Unavailable { sku: line.sku.clone() });
            }
            if line.quantity > line.available {
                return Err(CartError::InsufficientStock { sku: line.sku.clone(), available: line.available });
            }
        }
        Ok(())
    }
}

/// Summary sent back with every cart response.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub currency: String,
    pub total_weight_grams: i64,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let subtotal = cart.subtotal();
        Self {
            item_count: cart.item_count(),
            subtotal: subtotal.amount(),
            currency: subtotal.currency().to_string(),
            total_weight_grams: cart.total_weight_grams(),
            cart,
        }
    }
}

/// Quantity a line ends up with after adding `adding` units, checked against stock.
pub fn merged_quantity(existing: Option<u32>, adding: u32, available: i32, sku: &str) -> Result<u32, CartError> {
    if adding == 0 { return Err(CartError::InvalidQuantity); }
    let total = Quantity::new(existing.unwrap_or(0)).add(adding);
    ensure_within_stock(total.value(), available, sku)?;
    Ok(total.value())
}

pub fn ensure_within_stock(quantity: u32, available: i32, sku: &str) -> Result<(), CartError> {
    if i64::from(quantity) > i64::from(available.max(0)) {
        return Err(CartError::InsufficientStock { sku: sku.to_string(), available });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("item not found in cart")]
    ItemNotFound,
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("{sku} is no longer available")]
    Unavailable { sku: String },
    #[error("only {available} of {sku} left in stock")]
    InsufficientStock { sku: String, available: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, price: i64, qty: i32, available: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(), variant_id: Uuid::new_v4(), product_id: Uuid::new_v4(),
            product_name: "Baju Melayu".into(), product_slug: "baju-melayu".into(),
            product_status: ProductStatus::Active, sku: sku.into(), size: Some("L".into()), color: None,
            image: None, unit_price: Decimal::from(price), quantity: qty, available, weight_grams: 400,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart { id: Uuid::new_v4(), user_id: Uuid::new_v4(), lines: vec![line("A", 100, 2, 5), line("B", 50, 1, 5)] };
        assert_eq!(cart.subtotal().amount(), Decimal::from(250));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_weight_grams(), 1200);
        let view = CartView::from(cart);
        assert_eq!(view.currency, "MYR");
    }

    #[test]
    fn test_merge_checks_stock() {
        assert_eq!(merged_quantity(Some(2), 1, 5, "A"), Ok(3));
        assert_eq!(merged_quantity(None, 3, 3, "A"), Ok(3));
        assert_eq!(merged_quantity(Some(2), 2, 3, "A"), Err(CartError::InsufficientStock { sku: "A".into(), available: 3 }));
        assert_eq!(merged_quantity(None, 0, 3, "A"), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_purchasable_checks() {
        let empty = Cart { id: Uuid::new_v4(), user_id: Uuid::new_v4(), lines: vec![] };
        assert_eq!(empty.ensure_purchasable(), Err(CartError::Empty));

        let mut draft = line("D", 10, 1, 5);
        draft.product_status = ProductStatus::Archived;
        let cart = Cart { id: Uuid::new_v4(), user_id: Uuid::new_v4(), lines: vec![draft] };
        assert_eq!(cart.ensure_purchasable(), Err(CartError::Unavailable { sku: "D".into() }));

        let cart = Cart { id: Uuid::new_v4(), user_id: Uuid::new_v4(), lines: vec![line("A", 10, 4, 3)] };
        assert!(matches!(cart.ensure_purchasable(), Err(CartError::InsufficientStock { .. })));
    }
}
