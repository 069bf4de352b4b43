//! Shipping zones and rates

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

text_enum! {
    /// What a rate's `[min_value, max_value]` range is measured against.
    RateKind { Flat => "flat", OrderValue => "order_value", Weight => "weight" }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingZone {
    pub id: Uuid,
    pub name: String,
    /// ISO country codes.
    pub countries: Vec<String>,
    /// Empty means every state of the listed countries.
    pub states: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingZone {
    pub fn covers(&self, country: &str, state: &str) -> bool {
        self.is_active
            && self.countries.iter().any(|c| c.trim().eq_ignore_ascii_case(country.trim()))
            && (self.states.is_empty() || self.states.iter().any(|s| s.trim().eq_ignore_ascii_case(state.trim())))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingRate {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub kind: RateKind,
    /// Inclusive lower bound (MYR for order value, grams for weight).
    pub min_value: Option<Decimal>,
    /// Inclusive upper bound; open-ended when absent.
    pub max_value: Option<Decimal>,
    pub price: Decimal,
    pub estimated_days: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingRate {
    pub fn matches(&self, parcel: &Parcel) -> bool {
        if !self.is_active { return false; }
        let measured = match self.kind {
            RateKind::Flat => return true,
            RateKind::OrderValue => parcel.subtotal,
            RateKind::Weight => Decimal::from(parcel.weight_grams),
        };
        self.min_value.map_or(true, |min| measured >= min) && self.max_value.map_or(true, |max| measured <= max)
    }
}

/// What the shipping calculation needs to know about an order.
#[derive(Clone, Debug)]
pub struct Parcel {
    pub country: String,
    pub state: String,
    pub subtotal: Decimal,
    pub weight_grams: i64,
}

/// Active rates of every zone covering the destination that accept the
/// parcel, cheapest first (ties broken by name).
pub fn matching_rates<'a>(zones: &[ShippingZone], rates: &'a [ShippingRate], parcel: &Parcel) -> Vec<&'a ShippingRate> {
    let zone_ids: Vec<Uuid> = zones.iter().filter(|z| z.covers(&parcel.country, &parcel.state)).map(|z| z.id).collect();
    let mut found: Vec<&ShippingRate> = rates
        .iter()
        .filter(|r| zone_ids.contains(&r.zone_id) && r.matches(parcel))
        .collect();
    found.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
    found
}

/// Picks the requested rate if it applies, otherwise the cheapest applicable one.
pub fn select_rate<'a>(candidates: &[&'a ShippingRate], requested: Option<Uuid>) -> Result<&'a ShippingRate, ShippingError> {
    match requested {
        Some(id) => candidates.iter().copied().find(|r| r.id == id).ok_or(ShippingError::RateNotApplicable(id)),
        None => candidates.first().copied().ok_or(ShippingError::NoRateAvailable),
    }
}

/// Charge for the chosen rate after the free-shipping threshold.
pub fn shipping_charge(rate: &ShippingRate, subtotal: Decimal, free_shipping_threshold: Option<Decimal>) -> Decimal {
    match free_shipping_threshold {
        Some(threshold) if subtotal >= threshold => Decimal::ZERO,
        _ => rate.price,
    }
}

/// Checks an admin-submitted rate definition.
pub fn validate_rate(kind: RateKind, min: Option<Decimal>, max: Option<Decimal>, price: Decimal) -> Result<(), ShippingError> {
    if price.is_sign_negative() { return Err(ShippingError::InvalidRange("price must not be negative".into())); }
    if kind == RateKind::Flat && (min.is_some() || max.is_some()) {
        return Err(ShippingError::InvalidRange("flat rates take no range".into()));
    }
    if min.is_some_and(|m| m.is_sign_negative()) || max.is_some_and(|m| m.is_sign_negative()) {
        return Err(ShippingError::InvalidRange("range bounds must not be negative".into()));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max { return Err(ShippingError::InvalidRange("min_value exceeds max_value".into())); }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingError {
    #[error("no shipping rate is available for this address")]
    NoRateAvailable,
    #[error("shipping rate {0} does not apply to this order")]
    RateNotApplicable(Uuid),
    #[error("invalid shipping rate: {0}")]
    InvalidRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(countries: &[&str], states: &[&str]) -> ShippingZone {
        ShippingZone {
            id: Uuid::new_v4(), name: "Zone".into(),
            countries: countries.iter().map(|s| s.to_string()).collect(),
            states: states.iter().map(|s| s.to_string()).collect(),
            is_active: true, created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    fn rate(zone_id: Uuid, name: &str, kind: RateKind, min: Option<i64>, max: Option<i64>, price: i64) -> ShippingRate {
        ShippingRate {
            id: Uuid::new_v4(), zone_id, name: name.into(), kind,
            min_value: min.map(Decimal::from), max_value: max.map(Decimal::from),
            price: Decimal::from(price), estimated_days: None, is_active: true,
            created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    fn parcel(state: &str, subtotal: i64, grams: i64) -> Parcel {
        Parcel { country: "MY".into(), state: state.into(), subtotal: Decimal::from(subtotal), weight_grams: grams }
    }

    #[test]
    fn test_zone_coverage() {
        let west = zone(&["MY"], &["Selangor", "Johor"]);
        assert!(west.covers("my", "selangor"));
        assert!(!west.covers("MY", "Sabah"));
        assert!(zone(&["MY"], &[]).covers("MY", "Sabah"));
        assert!(!zone(&["SG"], &[]).covers("MY", "Johor"));
    }

    #[test]
    fn test_order_value_range_is_inclusive() {
        let z = zone(&["MY"], &[]);
        let r = rate(z.id, "Standard", RateKind::OrderValue, Some(0), Some(150), 8);
        assert!(r.matches(&parcel("Johor", 150, 0)));
        assert!(r.matches(&parcel("Johor", 0, 0)));
        assert!(!r.matches(&parcel("Johor", 151, 0)));
    }

    #[test]
    fn test_weight_range() {
        let z = zone(&["MY"], &[]);
        let light = rate(z.id, "Light", RateKind::Weight, None, Some(1000), 6);
        let heavy = rate(z.id, "Heavy", RateKind::Weight, Some(1001), None, 15);
        let p = parcel("Johor", 80, 1500);
        assert!(!light.matches(&p));
        assert!(heavy.matches(&p));
    }

    #[test]
    fn test_cheapest_matching_rate_selected() {
        let west = zone(&["MY"], &["Selangor"]);
        let east = zone(&["MY"], &["Sabah"]);
        let rates = vec![
            rate(west.id, "Express", RateKind::Flat, None, None, 15),
            rate(west.id, "Standard", RateKind::Flat, None, None, 8),
            rate(east.id, "East", RateKind::Flat, None, None, 5),
        ];
        let zones = vec![west, east];
        let found = matching_rates(&zones, &rates, &parcel("Selangor", 100, 500));
        assert_eq!(found.len(), 2);
        assert_eq!(select_rate(&found, None).unwrap().name, "Standard");
        let express = rates[0].id;
        assert_eq!(select_rate(&found, Some(express)).unwrap().name, "Express");
        assert_eq!(select_rate(&found, Some(rates[2].id)).map(|r| r.id), Err(ShippingError::RateNotApplicable(rates[2].id)));
    }

    #[test]
    fn test_no_rate_for_uncovered_destination() {
        let z = zone(&["MY"], &["Selangor"]);
        let rates = vec![rate(z.id, "Standard", RateKind::Flat, None, None, 8)];
        let found = matching_rates(&[z], &rates, &parcel("Sabah", 100, 500));
        assert!(found.is_empty());
        assert_eq!(select_rate(&found, None).map(|r| r.id), Err(ShippingError::NoRateAvailable));
    }

    #[test]
    fn test_free_shipping_threshold() {
        let r = rate(Uuid::new_v4(), "Standard", RateKind::Flat, None, None, 8);
        assert_eq!(shipping_charge(&r, Decimal::from(200), Some(Decimal::from(200))), Decimal::ZERO);
        assert_eq!(shipping_charge(&r, Decimal::from(199), Some(Decimal::from(200))), Decimal::from(8));
        assert_eq!(shipping_charge(&r, Decimal::from(999), None), Decimal::from(8));
    }

    #[test]
    fn test_rate_validation() {
        assert!(validate_rate(RateKind::Flat, None, None, Decimal::from(8)).is_ok());
        assert!(validate_rate(RateKind::Flat, Some(Decimal::ONE), None, Decimal::from(8)).is_err());
        assert!(validate_rate(RateKind::Weight, Some(Decimal::from(10)), Some(Decimal::from(5)), Decimal::from(8)).is_err());
        assert!(validate_rate(RateKind::OrderValue, Some(Decimal::ZERO), None, Decimal::from(8)).is_ok());
    }
}
