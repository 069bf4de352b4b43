//! Product and variant management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::products::{ProductInput, VariantInput};
use crate::db::{Paginated, ProductRepository};
use crate::domain::aggregates::product::{ensure_publishable, validate_pricing};
use crate::domain::aggregates::{Product, ProductDetail, ProductError, ProductStatus, ProductVariant};
use crate::domain::value_objects::{Sku, Slug};
use crate::error::Result;
use crate::http::handlers::catalog::ProductQuery;
use crate::http::handlers::{non_blank, validated};
use crate::http::AppState;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductFields {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(range(min = 0, max = 100000))]
    pub weight_grams: Option<i32>,
    /// Replaces collection membership when present.
    pub collection_ids: Option<Vec<Uuid>>,
}

impl ProductFields {
    fn into_input(self) -> Result<(ProductInput, Option<Vec<Uuid>>)> {
        validate_pricing(self.price, self.compare_at_price)?;
        let slug = Slug::explicit_or(self.slug.as_deref(), &self.name)?;
        let input = ProductInput {
            name: self.name.trim().to_string(),
            slug: slug.as_str().to_string(),
            description: non_blank(self.description),
            price: self.price,
            compare_at_price: self.compare_at_price,
            category_id: self.category_id,
            status: self.status.unwrap_or(ProductStatus::Draft),
            images: self.images.into_iter().map(|i| i.trim().to_string()).filter(|i| !i.is_empty()).collect(),
            tags: normalize_tags(self.tags),
            weight_grams: self.weight_grams.unwrap_or(0),
        };
        Ok((input, self.collection_ids))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VariantRequest {
    pub sku: String,
    #[validate(length(max = 20))]
    pub size: Option<String>,
    #[validate(length(max = 40))]
    pub color: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, max = 100000))]
    pub weight_grams: Option<i32>,
    /// Opening stock; only read when the variant is created.
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
}

impl VariantRequest {
    fn into_input(self) -> Result<(VariantInput, i32)> {
        let sku = Sku::new(self.sku.trim())?;
        if self.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(ProductError::NegativePrice.into());
        }
        let input = VariantInput {
            sku: sku.into_inner(),
            size: non_blank(self.size),
            color: non_blank(self.color),
            price: self.price,
            weight_grams: self.weight_grams,
        };
        Ok((input, self.stock.unwrap_or(0)))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    #[validate]
    pub product: ProductFields,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantRequest>,
}

/// Lower-cased, trimmed and de-duplicated.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Any status unless `?status=` narrows it.
pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ProductQuery>,
    Query(status): Query<StatusFilter>,
) -> Result<Json<Paginated<Product>>> {
    let (filter, page) = query.into_filter(status.status);
    Ok(Json(ProductRepository::new(&state.pool).list(&filter, page).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ProductStatus>,
}

pub async fn get(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<ProductDetail>> {
    let repo = ProductRepository::new(&state.pool);
    let product = repo.get(id).await?;
    Ok(Json(repo.detail(product).await?))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductDetail>)> {
    let body = validated(body)?;
    let (input, collection_ids) = body.product.into_input()?;
    let variants = body.variants.into_iter().map(VariantRequest::into_input).collect::<Result<Vec<_>>>()?;
    ensure_publishable(input.status, input.price, variants.len())?;

    let repo = ProductRepository::new(&state.pool);
    let product = repo.create(&input, &variants, collection_ids.as_deref().unwrap_or_default(), admin.id).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, variants = variants.len(), "Product created");
    Ok((StatusCode::CREATED, Json(repo.detail(product).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProductFields>,
) -> Result<Json<ProductDetail>> {
    let (input, collection_ids) = validated(body)?.into_input()?;
    let repo = ProductRepository::new(&state.pool);
    let variant_count = repo.variant_count(id).await?;
    ensure_publishable(input.status, input.price, usize::try_from(variant_count).unwrap_or(0))?;

    let product = repo.update(id, &input, collection_ids.as_deref()).await?;
    Ok(Json(repo.detail(product).await?))
}

/// Archives rather than deletes; past orders keep pointing at the product.
pub async fn archive(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    ProductRepository::new(&state.pool).archive(id).await?;
    tracing::info!(product_id = %id, "Product archived");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_variant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<VariantRequest>,
) -> Result<(StatusCode, Json<ProductVariant>)> {
    let (input, opening_stock) = validated(body)?.into_input()?;
    let repo = ProductRepository::new(&state.pool);
    repo.get(product_id).await?;
    let variant = repo.add_variant(product_id, &input, opening_stock, admin.id).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

pub async fn update_variant(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((product_id, variant_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<VariantRequest>,
) -> Result<Json<ProductVariant>> {
    let (input, _) = validated(body)?.into_input()?;
    Ok(Json(ProductRepository::new(&state.pool).update_variant(product_id, variant_id, &input).await?))
}

/// An active product keeps at least one variant.
pub async fn delete_variant(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((product_id, variant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let repo = ProductRepository::new(&state.pool);
    let product = repo.get(product_id).await?;
    if product.status == ProductStatus::Active && repo.variant_count(product_id).await? <= 1 {
        return Err(ProductError::NoVariants.into());
    }
    repo.delete_variant(product_id, variant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> ProductFields {
        ProductFields {
            name: "Baju Kurung Moden Sutera".into(),
            slug: None,
            description: Some("  ".into()),
            price: Decimal::new(25900, 2),
            compare_at_price: Some(Decimal::new(29900, 2)),
            category_id: None,
            status: None,
            images: vec![" https://cdn.binwahab.com/a.jpg ".into(), "".into()],
            tags: vec!["Raya".into(), "raya ".into(), "Sutera".into()],
            weight_grams: Some(450),
            collection_ids: None,
        }
    }

    #[test]
    fn test_fields_to_input() {
        let (input, collections) = fields().into_input().unwrap();
        assert_eq!(input.slug, "baju-kurung-moden-sutera");
        assert_eq!(input.status, ProductStatus::Draft);
        assert_eq!(input.description, None);
        assert_eq!(input.images, vec!["https://cdn.binwahab.com/a.jpg".to_string()]);
        assert_eq!(input.tags, vec!["raya".to_string(), "sutera".to_string()]);
        assert!(collections.is_none());
    }

    #[test]
    fn test_compare_at_must_exceed_price() {
        let mut f = fields();
        f.compare_at_price = Some(Decimal::new(10000, 2));
        assert!(f.into_input().is_err());
    }

    #[test]
    fn test_variant_sku_checked() {
        let variant = |sku: &str, price: Option<i64>| VariantRequest {
            sku: sku.into(),
            size: Some("M".into()),
            color: None,
            price: price.map(Decimal::from),
            weight_grams: None,
            stock: Some(4),
        };
        let (input, stock) = variant("BKS-M-EMR", None).into_input().unwrap();
        assert_eq!(input.sku, "BKS-M-EMR");
        assert_eq!(stock, 4);
        assert!(variant("has space", None).into_input().is_err());
        assert!(variant("BKS-M", Some(-1)).into_input().is_err());
    }
}
