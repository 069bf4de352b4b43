//! Category and collection repositories.

use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::catalog::ordered_membership;
use crate::domain::aggregates::{Category, Collection, Product};

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
}

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name").fetch_all(self.pool).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("category"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("category"))
    }

    /// Ids from `id` up to the root, following `parent_id`.
    pub async fn ancestors(&self, id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "WITH RECURSIVE chain(id, parent_id, depth) AS ( \
                 SELECT id, parent_id, 0 FROM categories WHERE id = $1 \
                 UNION ALL \
                 SELECT c.id, c.parent_id, chain.depth + 1 FROM categories c JOIN chain ON c.id = chain.parent_id \
                 WHERE chain.depth < 32 \
             ) SELECT id FROM chain ORDER BY depth",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        Ok(sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, slug, description, parent_id, image_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(&input.image_url)
        .fetch_one(self.pool)
        .await?)
    }

    pub async fn update(&self, id: Uuid, input: &CategoryInput) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, slug = $3, description = $4, parent_id = $5, image_url = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(&input.image_url)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("category"))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("category")); }
        Ok(())
    }
}

/// Fields accepted when creating or updating a collection.
#[derive(Debug, Clone)]
pub struct CollectionInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
}

pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, featured_only: bool) -> Result<Vec<Collection>, RepositoryError> {
        Ok(sqlx::query_as::<_, Collection>(
            "SELECT * FROM collections WHERE (NOT $1 OR is_featured) ORDER BY is_featured DESC, name",
        )
        .bind(featured_only)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Collection, RepositoryError> {
        sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("collection"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Collection, RepositoryError> {
        sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("collection"))
    }

    /// Products in a collection by position; `active_only` hides drafts and archived items.
    pub async fn products(&self, collection_id: Uuid, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        Ok(sqlx::query_as::<_, Product>(
            "SELECT p.* FROM products p JOIN product_collections pc ON pc.product_id = p.id \
             WHERE pc.collection_id = $1 AND (NOT $2 OR p.status = 'active') \
             ORDER BY pc.position, p.created_at DESC",
        )
        .bind(collection_id)
        .bind(active_only)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn create(&self, input: &CollectionInput) -> Result<Collection, RepositoryError> {
        Ok(sqlx::query_as::<_, Collection>(
            "INSERT INTO collections (id, name, slug, description, image_url, is_featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await?)
    }

    pub async fn update(&self, id: Uuid, input: &CollectionInput) -> Result<Collection, RepositoryError> {
        sqlx::query_as::<_, Collection>(
            "UPDATE collections SET name = $2, slug = $3, description = $4, image_url = $5, is_featured = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.is_featured)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("collection"))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM collections WHERE id = $1").bind(id).execute(self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("collection")); }
        Ok(())
    }

    /// Replaces the collection's product list; order of `product_ids` becomes the position.
    pub async fn set_products(&self, collection_id: Uuid, product_ids: &[Uuid]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM collections WHERE id = $1 FOR UPDATE")
            .bind(collection_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound("collection"))?;

        sqlx::query("DELETE FROM product_collections WHERE collection_id = $1")
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;

        for (product_id, position) in ordered_membership(product_ids) {
            sqlx::query("INSERT INTO product_collections (product_id, collection_id, position) VALUES ($1, $2, $3)")
                .bind(product_id)
                .bind(collection_id)
                .bind(position)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
