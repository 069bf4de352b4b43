//! Product and variant repository.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{like_pattern, Page, Paginated, RepositoryError};
use crate::domain::aggregates::catalog::ordered_membership;
use crate::domain::aggregates::{
    Category, InventoryTransactionKind, Product, ProductDetail, ProductStatus, ProductVariant,
};

/// Storefront / admin listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub category_slug: Option<String>,
    pub collection_slug: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC",
            Self::PriceAsc => "p.price ASC, p.created_at DESC",
            Self::PriceDesc => "p.price DESC, p.created_at DESC",
            Self::Name => "p.name ASC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub status: ProductStatus,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub weight_grams: i32,
}

#[derive(Debug, Clone)]
pub struct VariantInput {
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Option<Decimal>,
    pub weight_grams: Option<i32>,
}

const FILTER: &str = "($1::text IS NULL OR p.status = $1) \
    AND ($2::text IS NULL OR EXISTS (SELECT 1 FROM categories c WHERE c.id = p.category_id AND c.slug = $2)) \
    AND ($3::text IS NULL OR EXISTS (SELECT 1 FROM product_collections pc JOIN collections co ON co.id = pc.collection_id \
         WHERE pc.product_id = p.id AND co.slug = $3)) \
    AND ($4::text IS NULL OR p.name ILIKE $4 OR p.description ILIKE $4 OR $5 = ANY(p.tags)) \
    AND ($6::numeric IS NULL OR p.price >= $6) \
    AND ($7::numeric IS NULL OR p.price <= $7)";

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &ProductFilter, page: Page) -> Result<Paginated<Product>, RepositoryError> {
        let status = filter.status.map(|s| s.as_str());
        let pattern = filter.search.as_deref().map(like_pattern);
        let tag = filter.search.as_deref().map(|s| s.trim().to_lowercase());

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT p.* FROM products p WHERE {FILTER} ORDER BY {} LIMIT $8 OFFSET $9",
            filter.sort.order_by()
        ))
        .bind(status)
        .bind(&filter.category_slug)
        .bind(&filter.collection_slug)
        .bind(&pattern)
        .bind(&tag)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products p WHERE {FILTER}"))
            .bind(status)
            .bind(&filter.category_slug)
            .bind(&filter.collection_slug)
            .bind(&pattern)
            .bind(&tag)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(self.pool)
            .await?;

        Ok(Paginated::new(products, total, page))
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("product"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("product"))
    }

    /// Loads variants, category and collection membership around a product.
    pub async fn detail(&self, product: Product) -> Result<ProductDetail, RepositoryError> {
        let variants = self.variants(product.id).await?;

        let category = match product.category_id {
            Some(id) => sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?,
            None => None,
        };

        let collection_ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT collection_id FROM product_collections WHERE product_id = $1 ORDER BY position")
                .bind(product.id)
                .fetch_all(self.pool)
                .await?;

        Ok(ProductDetail {
            product,
            category,
            variants,
            collection_ids: collection_ids.into_iter().map(|(id,)| id).collect(),
        })
    }

    pub async fn variants(&self, product_id: Uuid) -> Result<Vec<ProductVariant>, RepositoryError> {
        Ok(sqlx::query_as::<_, ProductVariant>(
            "SELECT * FROM product_variants WHERE product_id = $1 ORDER BY created_at, sku",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Creates a product with its variants, opening stock and collection membership in one transaction.
    pub async fn create(
        &self,
        input: &ProductInput,
        variants: &[(VariantInput, i32)],
        collection_ids: &[Uuid],
        actor: Uuid,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, slug, description, price, compare_at_price, category_id, status, images, tags, weight_grams, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.category_id)
        .bind(input.status.as_str())
        .bind(&input.images)
        .bind(&input.tags)
        .bind(input.weight_grams)
        .fetch_one(&mut *tx)
        .await?;

        for (variant, opening_stock) in variants {
            insert_variant(&mut tx, product.id, variant, *opening_stock, actor).await?;
        }

        replace_collections(&mut tx, product.id, collection_ids).await?;

        tx.commit().await?;
        Ok(product)
    }

    /// Updates product fields and replaces its collection membership in one transaction.
    pub async fn update(&self, id: Uuid, input: &ProductInput, collection_ids: Option<&[Uuid]>) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6, category_id = $7, \
             status = $8, images = $9, tags = $10, weight_grams = $11, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.category_id)
        .bind(input.status.as_str())
        .bind(&input.images)
        .bind(&input.tags)
        .bind(input.weight_grams)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound("product"))?;

        if let Some(ids) = collection_ids {
            replace_collections(&mut tx, id, ids).await?;
        }

        tx.commit().await?;
        Ok(product)
    }

    pub async fn variant_count(&self, product_id: Uuid) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM product_variants WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Products stay referenced by past orders, so removal archives them.
    pub async fn archive(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE products SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(ProductStatus::Archived.as_str())
            .execute(self.pool)
            .await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("product")); }
        Ok(())
    }

    pub async fn add_variant(&self, product_id: Uuid, input: &VariantInput, opening_stock: i32, actor: Uuid) -> Result<ProductVariant, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let variant = insert_variant(&mut tx, product_id, input, opening_stock, actor).await?;
        tx.commit().await?;
        Ok(variant)
    }

    /// Updates descriptive fields; stock only moves through inventory transactions.
    pub async fn update_variant(&self, product_id: Uuid, variant_id: Uuid, input: &VariantInput) -> Result<ProductVariant, RepositoryError> {
        sqlx::query_as::<_, ProductVariant>(
            "UPDATE product_variants SET sku = $3, size = $4, color = $5, price = $6, weight_grams = $7, updated_at = NOW() \
             WHERE id = $1 AND product_id = $2 RETURNING *",
        )
        .bind(variant_id)
        .bind(product_id)
        .bind(&input.sku)
        .bind(&input.size)
        .bind(&input.color)
        .bind(input.price)
        .bind(input.weight_grams)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("variant"))
    }

    pub async fn delete_variant(&self, product_id: Uuid, variant_id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM product_variants WHERE id = $1 AND product_id = $2")
            .bind(variant_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("variant")); }
        Ok(())
    }
}

async fn insert_variant(
    conn: &mut PgConnection,
    product_id: Uuid,
    input: &VariantInput,
    opening_stock: i32,
    actor: Uuid,
) -> Result<ProductVariant, RepositoryError> {
    let variant = sqlx::query_as::<_, ProductVariant>(
        "INSERT INTO product_variants (id, product_id, sku, size, color, price, stock, reserved_stock, weight_grams, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(&input.sku)
    .bind(&input.size)
    .bind(&input.color)
    .bind(input.price)
    .bind(opening_stock)
    .bind(input.weight_grams)
    .fetch_one(&mut *conn)
    .await?;

    if opening_stock > 0 {
        sqlx::query(
            "INSERT INTO inventory_transactions (id, variant_id, kind, quantity, reference, note, created_by, created_at) \
             VALUES ($1, $2, $3, $4, NULL, 'opening stock', $5, NOW())",
        )
        .bind(Uuid::now_v7())
        .bind(variant.id)
        .bind(InventoryTransactionKind::Restock.as_str())
        .bind(opening_stock)
        .bind(actor)
        .execute(&mut *conn)
        .await?;
    }

    Ok(variant)
}

async fn replace_collections(conn: &mut PgConnection, product_id: Uuid, collection_ids: &[Uuid]) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM product_collections WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    for (collection_id, _) in ordered_membership(collection_ids) {
        sqlx::query(
            "INSERT INTO product_collections (product_id, collection_id, position) \
             VALUES ($1, $2, COALESCE((SELECT MAX(position) + 1 FROM product_collections WHERE collection_id = $2), 0))",
        )
        .bind(product_id)
        .bind(collection_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
