//! On-disk storage for uploaded images, served under `/media`.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::MediaConfig;
use crate::domain::aggregates::media::{check_signature, check_size, extension_for};
use crate::domain::aggregates::MediaError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Rejected(#[from] MediaError),
    #[error("media storage failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    dir: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

/// A file written to disk, not yet recorded in the database.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: Uuid,
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
}

impl MediaStorage {
    #[must_use]
    pub fn new(config: &MediaConfig, public_base_url: &str) -> Self {
        Self { dir: config.dir.clone(), public_base_url: public_base_url.trim_end_matches('/').to_string(), max_bytes: config.max_bytes }
    }

    pub fn dir(&self) -> &Path { &self.dir }
    pub fn max_bytes(&self) -> usize { self.max_bytes }

    /// Checks type, size and content signature, then writes the bytes under
    /// a fresh UUID name.
    pub async fn store(&self, content_type: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let extension = extension_for(content_type)?;
        check_size(bytes.len(), self.max_bytes)?;
        check_signature(content_type, bytes)?;

        let id = Uuid::now_v7();
        let file_name = format!("{id}.{extension}");
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;
        tracing::info!(%file_name, size = bytes.len(), "Media stored");

        Ok(StoredFile {
            id,
            url: format!("{}/media/{file_name}", self.public_base_url),
            file_name,
            content_type: content_type.to_ascii_lowercase(),
            size_bytes: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
        })
    }

    /// Removes a stored file; a file already gone is not an error.
    pub async fn remove(&self, file_name: &str) -> Result<(), StorageError> {
        // Names are generated by `store`; anything with a path separator is not ours.
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Ok(());
        }
        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: PathBuf) -> MediaStorage {
        MediaStorage::new(&MediaConfig { dir, max_bytes: 16 }, "http://localhost:8083/")
    }

    fn scratch_dir() -> PathBuf { std::env::temp_dir().join(format!("binwahab-media-{}", Uuid::new_v4())) }

    #[tokio::test]
    async fn test_store_and_remove() {
        let dir = scratch_dir();
        let media = storage(dir.clone());
        let stored = media.store("image/png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").await.unwrap();
        assert!(stored.file_name.ends_with(".png"));
        assert_eq!(stored.url, format!("http://localhost:8083/media/{}", stored.file_name));
        assert!(dir.join(&stored.file_name).exists());

        media.remove(&stored.file_name).await.unwrap();
        assert!(!dir.join(&stored.file_name).exists());
        media.remove(&stored.file_name).await.unwrap();
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_rejects_type_and_size() {
        let media = storage(scratch_dir());
        assert!(matches!(media.store("text/html", b"<p>").await, Err(StorageError::Rejected(MediaError::UnsupportedType(_)))));
        assert!(matches!(media.store("image/jpeg", &[0u8; 17]).await, Err(StorageError::Rejected(MediaError::TooLarge { .. }))));
        assert!(matches!(media.store("image/jpeg", &[]).await, Err(StorageError::Rejected(MediaError::Empty))));
    }

    #[tokio::test]
    async fn test_rejects_content_not_matching_type() {
        let dir = scratch_dir();
        let media = storage(dir.clone());
        let renamed = media.store("image/png", b"<svg onload=x>").await;
        assert!(matches!(renamed, Err(StorageError::Rejected(MediaError::ContentMismatch(_)))));
        assert!(!dir.exists());
    }
}
