//! Public catalogue: only active products are visible.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::non_blank;
use crate::db::products::{ProductFilter, ProductSort};
use crate::db::{CategoryRepository, CollectionRepository, Page, Paginated, ProductRepository, SettingsRepository};
use crate::domain::aggregates::{Category, Collection, Product, ProductDetail, ProductStatus, PublicSettings};
use crate::error::{AppError, Result};
use crate::http::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub collection: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    pub(crate) fn into_filter(self, status: Option<ProductStatus>) -> (ProductFilter, Page) {
        let page = Page::new(self.page, self.per_page);
        let filter = ProductFilter {
            status,
            category_slug: non_blank(self.category),
            collection_slug: non_blank(self.collection),
            search: non_blank(self.q),
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort.unwrap_or_default(),
        };
        (filter, page)
    }
}

pub async fn list_products(State(state): State<AppState>, Query(query): Query<ProductQuery>) -> Result<Json<Paginated<Product>>> {
    let (filter, page) = query.into_filter(Some(ProductStatus::Active));
    Ok(Json(ProductRepository::new(&state.pool).list(&filter, page).await?))
}

pub async fn get_product(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<ProductDetail>> {
    let repo = ProductRepository::new(&state.pool);
    let product = repo.get_by_slug(&slug).await?;
    if !product.is_visible() {
        return Err(AppError::not_found("product"));
    }
    Ok(Json(repo.detail(product).await?))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(&state.pool).list().await?))
}

pub async fn get_category(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Category>> {
    Ok(Json(CategoryRepository::new(&state.pool).get_by_slug(&slug).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionQuery {
    #[serde(default)]
    pub featured: bool,
}

pub async fn list_collections(State(state): State<AppState>, Query(query): Query<CollectionQuery>) -> Result<Json<Vec<Collection>>> {
    Ok(Json(CollectionRepository::new(&state.pool).list(query.featured).await?))
}

#[derive(Debug, Serialize)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub products: Vec<Product>,
}

pub async fn get_collection(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<CollectionView>> {
    let repo = CollectionRepository::new(&state.pool);
    let collection = repo.get_by_slug(&slug).await?;
    let products = repo.products(collection.id, true).await?;
    Ok(Json(CollectionView { collection, products }))
}

pub async fn store_settings(State(state): State<AppState>) -> Result<Json<PublicSettings>> {
    Ok(Json(SettingsRepository::new(&state.pool).load().await?.public()))
}
