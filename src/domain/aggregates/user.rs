//! Shoppers and back-office staff

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    UserRole { Customer => "customer", Admin => "admin" }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool { self.role == UserRole::Admin }
}

/// Canonical form used for lookups and the unique index.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalisation() {
        assert_eq!(normalize_email("  Aisyah@BinWahab.COM "), "aisyah@binwahab.com");
    }
}
