//! Value Objects for the store domain

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CURRENCY: &str = "MYR";

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        if value.chars().any(char::is_whitespace) { return Err(SkuError::Whitespace); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong, Whitespace }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "SKU empty"),
            Self::TooLong => write!(f, "SKU too long"),
            Self::Whitespace => write!(f, "SKU must not contain whitespace"),
        }
    }
}

/// URL handle for products, categories and collections.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    /// Builds a slug from free text: lowercase ASCII alphanumerics joined by single dashes.
    pub fn from_text(text: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(text.len());
        let mut pending_dash = false;
        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() { out.push('-'); }
                out.push(c.to_ascii_lowercase());
                pending_dash = false;
            } else {
                pending_dash = true;
            }
        }
        if out.is_empty() { return Err(SlugError::Empty); }
        if out.len() > 120 { return Err(SlugError::TooLong); }
        Ok(Self(out))
    }

    /// Accepts an explicit slug when given, otherwise derives one from `fallback`.
    pub fn explicit_or(explicit: Option<&str>, fallback: &str) -> Result<Self, SlugError> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Self::from_text(s),
            None => Self::from_text(fallback),
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SlugError { Empty, TooLong }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "slug has no usable characters"), Self::TooLong => write!(f, "slug too long") }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn myr(amount: Decimal) -> Self { Self::new(amount, DEFAULT_CURRENCY) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Amount in the currency's minor unit (sen for MYR), rounded half-up.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64().ok_or(MoneyError::Overflow)
    }

    pub fn from_minor_units(minor: i64, currency: &str) -> Self { Self::new(Decimal::new(minor, 2), currency) }
}

impl Default for Money { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {:.2}", self.currency, self.amount) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch, Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::CurrencyMismatch => write!(f, "Currency mismatch"), Self::Overflow => write!(f, "Amount out of range") }
    }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new(" bw-kurung-01 ").unwrap(); assert_eq!(sku.as_str(), "BW-KURUNG-01"); }
    #[test]
    fn test_sku_rejects_inner_whitespace() { assert_eq!(Sku::new("BW 01"), Err(SkuError::Whitespace)); }
    #[test]
    fn test_money_add() {
        let a = Money::myr(Decimal::new(100, 0));
        let b = Money::myr(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::new(Decimal::ONE, "usd")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_minor_units() {
        let m = Money::myr(Decimal::new(12990, 2));
        assert_eq!(m.to_minor_units().unwrap(), 12990);
        assert_eq!(Money::from_minor_units(12990, "MYR"), m);
    }
    #[test]
    fn test_slug_from_text() {
        assert_eq!(Slug::from_text("Baju Kurung  Moden (2024)!").unwrap().as_str(), "baju-kurung-moden-2024");
        assert_eq!(Slug::from_text("  --Raya-- ").unwrap().as_str(), "raya");
        assert_eq!(Slug::from_text("!!!"), Err(SlugError::Empty));
        assert_eq!(Slug::explicit_or(Some("  "), "Jubah Lelaki").unwrap().as_str(), "jubah-lelaki");
    }
    #[test]
    fn test_quantity_subtract() {
        assert_eq!(Quantity::new(3).subtract(4), None);
        assert_eq!(Quantity::new(3).subtract(3).map(|q| q.is_zero()), Some(true));
    }
}
