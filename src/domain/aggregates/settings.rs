//! Store-wide settings kept as key/JSON pairs

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::returns::DEFAULT_RETURN_WINDOW_DAYS;
use crate::domain::value_objects::DEFAULT_CURRENCY;

pub const STORE_NAME: &str = "store_name";
pub const CURRENCY: &str = "currency";
pub const RETURN_WINDOW_DAYS: &str = "return_window_days";
pub const FREE_SHIPPING_THRESHOLD: &str = "free_shipping_threshold";
pub const LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Typed view over the raw settings table.
#[derive(Clone, Debug, Serialize)]
pub struct StoreSettings {
    pub store_name: String,
    pub currency: String,
    pub return_window_days: i64,
    pub free_shipping_threshold: Option<Decimal>,
    pub low_stock_threshold: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "BINWAHAB".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            return_window_days: DEFAULT_RETURN_WINDOW_DAYS,
            free_shipping_threshold: None,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

impl StoreSettings {
    /// Unknown or malformed values fall back to defaults.
    pub fn from_pairs(raw: &HashMap<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            store_name: raw.get(STORE_NAME).and_then(Value::as_str).map(str::to_string).unwrap_or(defaults.store_name),
            currency: raw.get(CURRENCY).and_then(Value::as_str).map(str::to_uppercase).unwrap_or(defaults.currency),
            return_window_days: raw
                .get(RETURN_WINDOW_DAYS)
                .and_then(Value::as_i64)
                .filter(|d| *d >= 0)
                .unwrap_or(defaults.return_window_days),
            free_shipping_threshold: raw.get(FREE_SHIPPING_THRESHOLD).and_then(decimal_value),
            low_stock_threshold: raw
                .get(LOW_STOCK_THRESHOLD)
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(defaults.low_stock_threshold),
        }
    }

    pub fn public(&self) -> PublicSettings {
        PublicSettings {
            store_name: self.store_name.clone(),
            currency: self.currency.clone(),
            free_shipping_threshold: self.free_shipping_threshold,
        }
    }
}

/// Subset of settings the storefront may read without signing in.
#[derive(Clone, Debug, Serialize)]
pub struct PublicSettings {
    pub store_name: String,
    pub currency: String,
    pub free_shipping_threshold: Option<Decimal>,
}

/// Checks an admin update before it is stored. `null` clears optional keys.
pub fn validate_update(values: &HashMap<String, Value>) -> Result<(), SettingsError> {
    for (key, value) in values {
        let ok = match key.as_str() {
            STORE_NAME => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            CURRENCY => value.as_str().is_some_and(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic())),
            RETURN_WINDOW_DAYS => value.as_i64().is_some_and(|d| (0..=365).contains(&d)),
            FREE_SHIPPING_THRESHOLD => value.is_null() || decimal_value(value).is_some_and(|d| !d.is_sign_negative()),
            LOW_STOCK_THRESHOLD => value.as_i64().is_some_and(|t| (0..=i64::from(i32::MAX)).contains(&t)),
            _ => return Err(SettingsError::UnknownKey(key.clone())),
        };
        if !ok {
            return Err(SettingsError::InvalidValue(key.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {0}")]
    InvalidValue(String),
}

/// Accepts numbers and numeric strings.
fn decimal_value(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_when_missing() {
        let s = StoreSettings::from_pairs(&HashMap::new());
        assert_eq!(s.return_window_days, 14);
        assert_eq!(s.currency, "MYR");
        assert_eq!(s.free_shipping_threshold, None);
    }

    #[test]
    fn test_typed_values() {
        let raw = HashMap::from([
            (STORE_NAME.to_string(), json!("BINWAHAB Official")),
            (RETURN_WINDOW_DAYS.to_string(), json!(30)),
            (FREE_SHIPPING_THRESHOLD.to_string(), json!("150.00")),
            (LOW_STOCK_THRESHOLD.to_string(), json!(2)),
        ]);
        let s = StoreSettings::from_pairs(&raw);
        assert_eq!(s.store_name, "BINWAHAB Official");
        assert_eq!(s.return_window_days, 30);
        assert_eq!(s.free_shipping_threshold, Some(Decimal::new(15000, 2)));
        assert_eq!(s.low_stock_threshold, 2);
        assert_eq!(s.public().free_shipping_threshold, Some(Decimal::from(150)));
    }

    #[test]
    fn test_update_validation() {
        let ok = HashMap::from([
            (CURRENCY.to_string(), json!("MYR")),
            (FREE_SHIPPING_THRESHOLD.to_string(), json!(null)),
            (RETURN_WINDOW_DAYS.to_string(), json!(7)),
        ]);
        assert!(validate_update(&ok).is_ok());

        let unknown = HashMap::from([("theme".to_string(), json!("dark"))]);
        assert_eq!(validate_update(&unknown), Err(SettingsError::UnknownKey("theme".into())));

        let negative = HashMap::from([(FREE_SHIPPING_THRESHOLD.to_string(), json!("-1"))]);
        assert_eq!(validate_update(&negative), Err(SettingsError::InvalidValue(FREE_SHIPPING_THRESHOLD.into())));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let raw = HashMap::from([
            (RETURN_WINDOW_DAYS.to_string(), json!("soon")),
            (FREE_SHIPPING_THRESHOLD.to_string(), json!(null)),
        ]);
        let s = StoreSettings::from_pairs(&raw);
        assert_eq!(s.return_window_days, 14);
        assert_eq!(s.free_shipping_threshold, None);
    }
}
