//! Categories and collections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rejects a parent assignment that would make a category its own ancestor.
///
/// `ancestors_of_parent` is the chain from the proposed parent up to the root.
pub fn ensure_acyclic_parent(category_id: Uuid, parent_id: Option<Uuid>, ancestors_of_parent: &[Uuid]) -> Result<(), CatalogError> {
    let Some(parent) = parent_id else { return Ok(()) };
    if parent == category_id || ancestors_of_parent.contains(&category_id) {
        return Err(CatalogError::CyclicParent);
    }
    Ok(())
}

/// Removes duplicate product ids while keeping first-seen order, which becomes the position.
pub fn ordered_membership(product_ids: &[Uuid]) -> Vec<(Uuid, i32)> {
    let mut seen = std::collections::HashSet::new();
    product_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .enumerate()
        .map(|(pos, id)| (*id, pos as i32))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("a category cannot be nested under itself")]
    CyclicParent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_cycle_detection() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(ensure_acyclic_parent(a, None, &[]).is_ok());
        assert!(ensure_acyclic_parent(a, Some(b), &[b]).is_ok());
        assert_eq!(ensure_acyclic_parent(a, Some(a), &[]), Err(CatalogError::CyclicParent));
        // b's chain already runs through a
        assert_eq!(ensure_acyclic_parent(a, Some(b), &[b, a]), Err(CatalogError::CyclicParent));
    }

    #[test]
    fn test_membership_dedup_keeps_order() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(ordered_membership(&[x, y, x]), vec![(x, 0), (y, 1)]);
    }
}
