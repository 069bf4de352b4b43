//! Uploaded media

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ALLOWED_CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: Uuid,
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// File extension stored for an accepted upload.
pub fn extension_for(content_type: &str) -> Result<&'static str, MediaError> {
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(ct, _)| ct.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| MediaError::UnsupportedType(content_type.to_string()))
}

/// The leading bytes must match the declared image type.
pub fn check_signature(content_type: &str, bytes: &[u8]) -> Result<(), MediaError> {
    let matches = match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "image/gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        "image/webp" => bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP",
        _ => false,
    };
    if matches { Ok(()) } else { Err(MediaError::ContentMismatch(content_type.to_string())) }
}

pub fn check_size(size: usize, max: usize) -> Result<(), MediaError> {
    if size == 0 { return Err(MediaError::Empty); }
    if size > max { return Err(MediaError::TooLarge { max }); }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("file content is not a valid {0}")]
    ContentMismatch(String),
    #[error("file is empty")]
    Empty,
    #[error("file exceeds {max} bytes")]
    TooLarge { max: usize },
    #[error("multipart field `file` is missing")]
    MissingFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(extension_for("image/PNG"), Ok("png"));
        assert!(matches!(extension_for("application/pdf"), Err(MediaError::UnsupportedType(_))));
    }

    #[test]
    fn test_signature_must_match_type() {
        assert!(check_signature("image/png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").is_ok());
        assert!(check_signature("image/JPEG", &[0xFF, 0xD8, 0xFF, 0xE0]).is_ok());
        assert!(check_signature("image/gif", b"GIF89a\x01\x00").is_ok());
        assert!(check_signature("image/webp", b"RIFF\x24\0\0\0WEBPVP8 ").is_ok());

        let html = b"<html><script>alert(1)</script>";
        assert_eq!(check_signature("image/png", html), Err(MediaError::ContentMismatch("image/png".into())));
        assert!(check_signature("image/jpeg", b"\x89PNG\r\n\x1a\n").is_err());
        assert!(check_signature("image/webp", b"RIFF\0\0\0\0WAVE").is_err());
    }

    #[test]
    fn test_size_limits() {
        assert_eq!(check_size(0, 10), Err(MediaError::Empty));
        assert_eq!(check_size(11, 10), Err(MediaError::TooLarge { max: 10 }));
        assert!(check_size(10, 10).is_ok());
    }
}
