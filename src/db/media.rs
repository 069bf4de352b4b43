//! Media library rows. Files themselves live on disk, see `services::media`.

use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, Paginated, RepositoryError};
use crate::domain::aggregates::Media;

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub id: Uuid,
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub uploaded_by: Uuid,
}

pub struct MediaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MediaRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, media: &NewMedia) -> Result<Media, RepositoryError> {
        Ok(sqlx::query_as::<_, Media>(
            "INSERT INTO media (id, file_name, url, content_type, size_bytes, alt_text, uploaded_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING *",
        )
        .bind(media.id)
        .bind(&media.file_name)
        .bind(&media.url)
        .bind(&media.content_type)
        .bind(media.size_bytes)
        .bind(&media.alt_text)
        .bind(media.uploaded_by)
        .fetch_one(self.pool)
        .await?)
    }

    pub async fn list(&self, page: Page) -> Result<Paginated<Media>, RepositoryError> {
        let rows = sqlx::query_as::<_, Media>("SELECT * FROM media ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media").fetch_one(self.pool).await?;
        Ok(Paginated::new(rows, total, page))
    }

    /// Deletes the row and returns it so the caller can remove the file.
    pub async fn delete(&self, id: Uuid) -> Result<Media, RepositoryError> {
        sqlx::query_as::<_, Media>("DELETE FROM media WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("media"))
    }
}
