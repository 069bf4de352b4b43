//! Customer addresses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Copy of an address frozen onto an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
}

impl From<&Address> for ShippingAddress {
    fn from(a: &Address) -> Self {
        Self {
            full_name: a.full_name.clone(),
            phone: a.phone.clone(),
            line1: a.line1.clone(),
            line2: a.line2.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            postcode: a.postcode.clone(),
            country: a.country.clone(),
        }
    }
}

/// A new address becomes the default when asked to, or when it is the user's first.
pub fn becomes_default(requested: bool, existing_addresses: i64) -> bool { requested || existing_addresses == 0 }

/// The address to promote after the default one is deleted: the most recently created.
pub fn successor_default(remaining: &[Address]) -> Option<Uuid> {
    remaining.iter().max_by_key(|a| a.created_at).map(|a| a.id)
}

/// Normalises a country to its upper-case ISO code, defaulting to Malaysia.
pub fn normalize_country(country: Option<&str>) -> String {
    country.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("MY").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn address(age_days: i64) -> Address {
        let created = Utc::now() - Duration::days(age_days);
        Address {
            id: Uuid::new_v4(), user_id: Uuid::nil(), full_name: "Nur Aisyah".into(), phone: "+60123456789".into(),
            line1: "12 Jalan Ampang".into(), line2: None, city: "Kuala Lumpur".into(), state: "WP Kuala Lumpur".into(),
            postcode: "50450".into(), country: "MY".into(), is_default: false, created_at: created, updated_at: created,
        }
    }

    #[test]
    fn test_first_address_is_default() {
        assert!(becomes_default(false, 0));
        assert!(becomes_default(true, 3));
        assert!(!becomes_default(false, 3));
    }

    #[test]
    fn test_successor_is_newest() {
        let old = address(10);
        let new = address(1);
        let newest = new.id;
        assert_eq!(successor_default(&[old, new]), Some(newest));
        assert_eq!(successor_default(&[]), None);
    }

    #[test]
    fn test_snapshot_copies_fields() {
        let a = address(0);
        let snap = ShippingAddress::from(&a);
        assert_eq!(snap.postcode, "50450");
        assert_eq!(snap.state, a.state);
    }

    #[test]
    fn test_country_normalisation() {
        assert_eq!(normalize_country(None), "MY");
        assert_eq!(normalize_country(Some(" sg ")), "SG");
        assert_eq!(normalize_country(Some("")), "MY");
    }
}
