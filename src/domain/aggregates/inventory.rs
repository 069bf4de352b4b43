//! Inventory bookkeeping
//!
//! Every stock movement on a variant is recorded as an [`InventoryTransaction`]
//! and applied to the variant's [`StockLevel`] in the same database
//! transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

text_enum! {
    InventoryTransactionKind {
        Restock => "restock",
        Sale => "sale",
        Return => "return",
        Adjustment => "adjustment",
        Reserve => "reserve",
        Release => "release",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub variant_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: InventoryTransactionKind,
    pub quantity: i32,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub stock: i32,
    pub reserved: i32,
}

impl StockLevel {
    pub fn available(&self) -> i32 { (self.stock - self.reserved).max(0) }

    /// Returns the level after applying `quantity` units of `kind`.
    ///
    /// `quantity` is signed only for adjustments; every other kind takes a
    /// positive count.
    pub fn apply(self, kind: InventoryTransactionKind, quantity: i32) -> Result<StockLevel, InventoryError> {
        use InventoryTransactionKind::*;

        match kind {
            Adjustment if quantity == 0 => return Err(InventoryError::InvalidQuantity),
            Adjustment => {}
            _ if quantity <= 0 => return Err(InventoryError::InvalidQuantity),
            _ => {}
        }

        let mut next = self;
        match kind {
            Restock | Return => {
                next.stock = self.stock.checked_add(quantity).ok_or(InventoryError::Overflow)?;
            }
            Sale => {
                if quantity > self.available() {
                    return Err(InventoryError::InsufficientStock { available: self.available(), requested: quantity });
                }
                next.stock -= quantity;
            }
            Adjustment => {
                let stock = self.stock.checked_add(quantity).ok_or(InventoryError::Overflow)?;
                if stock < self.reserved {
                    return Err(InventoryError::InsufficientStock { available: self.available(), requested: -quantity });
                }
                next.stock = stock;
            }
            Reserve => {
                if quantity > self.available() {
                    return Err(InventoryError::InsufficientStock { available: self.available(), requested: quantity });
                }
                next.reserved += quantity;
            }
            Release => {
                if quantity > self.reserved {
                    return Err(InventoryError::InsufficientReserved { reserved: self.reserved, requested: quantity });
                }
                next.reserved -= quantity;
            }
        }
        Ok(next)
    }

    pub fn is_low(&self, threshold: i32) -> bool { self.available() <= threshold }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("quantity must be positive (or non-zero for adjustments)")]
    InvalidQuantity,
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },
    #[error("cannot release {requested} units, only {reserved} reserved")]
    InsufficientReserved { reserved: i32, requested: i32 },
    #[error("stock level out of range")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use InventoryTransactionKind::*;

    const LEVEL: StockLevel = StockLevel { stock: 10, reserved: 2 };

    #[test]
    fn test_each_kind_moves_the_right_counter() {
        assert_eq!(LEVEL.apply(Restock, 5).unwrap(), StockLevel { stock: 15, reserved: 2 });
        assert_eq!(LEVEL.apply(Return, 1).unwrap(), StockLevel { stock: 11, reserved: 2 });
        assert_eq!(LEVEL.apply(Sale, 8).unwrap(), StockLevel { stock: 2, reserved: 2 });
        assert_eq!(LEVEL.apply(Adjustment, -3).unwrap(), StockLevel { stock: 7, reserved: 2 });
        assert_eq!(LEVEL.apply(Adjustment, 4).unwrap(), StockLevel { stock: 14, reserved: 2 });
        assert_eq!(LEVEL.apply(Reserve, 3).unwrap(), StockLevel { stock: 10, reserved: 5 });
        assert_eq!(LEVEL.apply(Release, 2).unwrap(), StockLevel { stock: 10, reserved: 0 });
    }

    #[test]
    fn test_sale_cannot_eat_reserved_units() {
        assert_eq!(LEVEL.apply(Sale, 9), Err(InventoryError::InsufficientStock { available: 8, requested: 9 }));
    }

    #[test]
    fn test_adjustment_cannot_drop_below_reserved() {
        assert!(LEVEL.apply(Adjustment, -9).is_err());
        assert!(LEVEL.apply(Adjustment, -8).is_ok());
    }

    #[test]
    fn test_release_bounded_by_reserved() {
        assert_eq!(LEVEL.apply(Release, 3), Err(InventoryError::InsufficientReserved { reserved: 2, requested: 3 }));
    }

    #[test]
    fn test_quantity_sign_rules() {
        assert_eq!(LEVEL.apply(Restock, 0), Err(InventoryError::InvalidQuantity));
        assert_eq!(LEVEL.apply(Sale, -1), Err(InventoryError::InvalidQuantity));
        assert_eq!(LEVEL.apply(Adjustment, 0), Err(InventoryError::InvalidQuantity));
    }

    #[test]
    fn test_low_stock() {
        assert!(StockLevel { stock: 6, reserved: 1 }.is_low(5));
        assert!(!StockLevel { stock: 7, reserved: 1 }.is_low(5));
    }
}
