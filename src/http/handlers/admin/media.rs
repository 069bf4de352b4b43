//! Media library: multipart image upload, listing and removal.

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::db::media::NewMedia;
use crate::db::{MediaRepository, Paginated};
use crate::domain::aggregates::{Media, MediaError};
use crate::error::{AppError, Result};
use crate::http::handlers::{non_blank, PageQuery};
use crate::http::AppState;

/// Accepts a `file` part and an optional `alt_text` part.
pub async fn upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Media>)> {
    let mut file: Option<(String, Bytes)> = None;
    let mut alt_text = None;

    while let Some(field) = multipart.next_field().await.map_err(AppError::bad_request)? {
        match field.name() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let data = field.bytes().await.map_err(AppError::bad_request)?;
                file = Some((content_type, data));
            }
            Some("alt_text") => alt_text = non_blank(Some(field.text().await.map_err(AppError::bad_request)?)),
            _ => {}
        }
    }

    let (content_type, data) = file.ok_or(MediaError::MissingFile)?;
    let stored = state.media.store(&content_type, &data).await?;
    let record = NewMedia {
        id: stored.id,
        file_name: stored.file_name.clone(),
        url: stored.url,
        content_type: stored.content_type,
        size_bytes: stored.size_bytes,
        alt_text,
        uploaded_by: admin.id,
    };

    match MediaRepository::new(&state.pool).insert(&record).await {
        Ok(media) => Ok((StatusCode::CREATED, Json(media))),
        Err(e) => {
            if let Err(cleanup) = state.media.remove(&stored.file_name).await {
                tracing::warn!(file_name = %stored.file_name, error = %cleanup, "Orphaned media file left on disk");
            }
            Err(e.into())
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Media>>> {
    Ok(Json(MediaRepository::new(&state.pool).list(query.page()).await?))
}

pub async fn delete(State(state): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let media = MediaRepository::new(&state.pool).delete(id).await?;
    state.media.remove(&media.file_name).await?;
    tracing::info!(media_id = %id, file_name = %media.file_name, "Media deleted");
    Ok(StatusCode::NO_CONTENT)
}
