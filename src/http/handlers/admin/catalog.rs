//! Categories and collections.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::catalog::{CategoryInput, CollectionInput};
use crate::db::{CategoryRepository, CollectionRepository};
use crate::domain::aggregates::catalog::ensure_acyclic_parent;
use crate::domain::aggregates::{Category, Collection, Product};
use crate::domain::value_objects::Slug;
use crate::error::Result;
use crate::http::handlers::{non_blank, validated};
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 120))]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl CategoryRequest {
    fn into_input(self) -> Result<CategoryInput> {
        let slug = Slug::explicit_or(self.slug.as_deref(), &self.name)?;
        Ok(CategoryInput {
            name: self.name.trim().to_string(),
            slug: slug.as_str().to_string(),
            description: non_blank(self.description),
            parent_id: self.parent_id,
            image_url: non_blank(self.image_url),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CollectionRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 120))]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl CollectionRequest {
    fn into_input(self) -> Result<CollectionInput> {
        let slug = Slug::explicit_or(self.slug.as_deref(), &self.name)?;
        Ok(CollectionInput {
            name: self.name.trim().to_string(),
            slug: slug.as_str().to_string(),
            description: non_blank(self.description),
            image_url: non_blank(self.image_url),
            is_featured: self.is_featured,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CollectionProductsRequest {
    pub product_ids: Vec<Uuid>,
}

pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let input = validated(body)?.into_input()?;
    let repo = CategoryRepository::new(&state.pool);
    if let Some(parent) = input.parent_id {
        repo.get(parent).await?;
    }
    Ok((StatusCode::CREATED, Json(repo.create(&input).await?)))
}

pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    let input = validated(body)?.into_input()?;
    let repo = CategoryRepository::new(&state.pool);
    let chain = match input.parent_id {
        Some(parent) => repo.ancestors(parent).await?,
        None => Vec::new(),
    };
    ensure_acyclic_parent(id, input.parent_id, &chain)?;
    Ok(Json(repo.update(id, &input).await?))
}

pub async fn delete_category(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    CategoryRepository::new(&state.pool).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Includes collections that are not featured.
pub async fn list_collections(State(state): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<Vec<Collection>>> {
    Ok(Json(CollectionRepository::new(&state.pool).list(false).await?))
}

pub async fn create_collection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<CollectionRequest>,
) -> Result<(StatusCode, Json<Collection>)> {
    let input = validated(body)?.into_input()?;
    Ok((StatusCode::CREATED, Json(CollectionRepository::new(&state.pool).create(&input).await?)))
}

pub async fn update_collection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CollectionRequest>,
) -> Result<Json<Collection>> {
    let input = validated(body)?.into_input()?;
    Ok(Json(CollectionRepository::new(&state.pool).update(id, &input).await?))
}

pub async fn delete_collection(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    CollectionRepository::new(&state.pool).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn collection_products(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Product>>> {
    let repo = CollectionRepository::new(&state.pool);
    repo.get(id).await?;
    Ok(Json(repo.products(id, false).await?))
}

/// Replaces membership; list order becomes display order.
pub async fn set_collection_products(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CollectionProductsRequest>,
) -> Result<Json<Vec<Product>>> {
    let repo = CollectionRepository::new(&state.pool);
    repo.set_products(id, &body.product_ids).await?;
    Ok(Json(repo.products(id, false).await?))
}
