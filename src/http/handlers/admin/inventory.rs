use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::db::inventory::Movement;
use crate::db::{InventoryRepository, Paginated, Page, SettingsRepository};
use crate::domain::aggregates::{InventoryTransaction, InventoryTransactionKind, ProductVariant};
use crate::error::Result;
use crate::http::handlers::{non_blank, validated};
use crate::http::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct MovementRequest {
    pub variant_id: Uuid,
    pub kind: InventoryTransactionKind,
    /// Signed for adjustments, positive for every other kind.
    pub quantity: i32,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MovementRecorded {
    pub transaction: InventoryTransaction,
    pub variant: ProductVariant,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub variant_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn record(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<MovementRequest>,
) -> Result<(StatusCode, Json<MovementRecorded>)> {
    let body = validated(body)?;
    let reference = non_blank(body.reference);
    let note = non_blank(body.note);
    let movement = Movement {
        variant_id: body.variant_id,
        kind: body.kind,
        quantity: body.quantity,
        reference: reference.as_deref(),
        note: note.as_deref(),
        actor: Some(admin.id),
    };

    let (transaction, variant) = InventoryRepository::new(&state.pool).record(&movement).await?;
    tracing::info!(
        sku = %variant.sku,
        kind = %transaction.kind,
        quantity = transaction.quantity,
        stock = variant.stock,
        reserved = variant.reserved_stock,
        "Inventory movement recorded"
    );

    let threshold = SettingsRepository::new(&state.pool).load().await?.low_stock_threshold;
    state.events.low_stock_check(&variant, threshold).await;
    Ok((StatusCode::CREATED, Json(MovementRecorded { transaction, variant })))
}

pub async fn history(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Paginated<InventoryTransaction>>> {
    let page = Page::new(query.page, query.per_page);
    Ok(Json(InventoryRepository::new(&state.pool).history(query.variant_id, page).await?))
}
