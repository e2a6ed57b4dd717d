use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::models::ProductImage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("invalid image id: {0}")]
    InvalidId(String),

    #[error("empty upload")]
    Empty,

    #[error("image storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, StorageError::Io(_))
    }
}

/// Backend that holds product images and deletes them by public id.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, bytes: Bytes, content_type: &str) -> Result<ProductImage, StorageError>;

    /// Returns `true` when an image was removed, `false` when none existed.
    async fn destroy(&self, public_id: &str) -> Result<bool, StorageError>;
}

const EXTENSIONS: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    EXTENSIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
}

/// Public ids are generated UUIDs; anything else could escape the upload root.
fn validate_public_id(public_id: &str) -> Result<(), StorageError> {
    Uuid::parse_str(public_id)
        .map(|_| ())
        .map_err(|_| StorageError::InvalidId(public_id.to_string()))
}

/// Stores images on the local filesystem, served back under `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let public_base_url: String = public_base_url.into();
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn file_path(&self, public_id: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{public_id}.{ext}"))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(&self, bytes: Bytes, content_type: &str) -> Result<ProductImage, StorageError> {
        let ext = extension_for(content_type)
            .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))?;
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }

        fs::create_dir_all(&self.root).await?;
        let public_id = Uuid::new_v4().to_string();
        fs::write(self.file_path(&public_id, ext), &bytes).await?;
        tracing::debug!(public_id = %public_id, size = bytes.len(), "image stored");

        Ok(ProductImage {
            url: format!("{}/uploads/{public_id}.{ext}", self.public_base_url),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, StorageError> {
        validate_public_id(public_id)?;
        let mut removed = false;
        for (_, ext) in EXTENSIONS {
            match fs::remove_file(self.file_path(public_id, ext)).await {
                Ok(()) => removed = true,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalImageStore {
        let root = std::env::temp_dir().join(format!("apparel-shop-{}", Uuid::new_v4()));
        LocalImageStore::new(root, "http://localhost:3000/")
    }

    #[test]
    fn maps_known_content_types() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("text/plain"), None);
    }

    #[tokio::test]
    async fn upload_then_destroy_removes_file() {
        let store = temp_store();
        let image = store
            .upload(Bytes::from_static(b"\x89PNG fake"), "image/png")
            .await
            .expect("upload");
        assert_eq!(
            image.url,
            format!("http://localhost:3000/uploads/{}.png", image.public_id)
        );
        assert!(store.file_path(&image.public_id, "png").exists());

        assert!(store.destroy(&image.public_id).await.expect("destroy"));
        assert!(!store.destroy(&image.public_id).await.expect("second destroy"));

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn rejects_path_like_ids_and_bad_types() {
        let store = temp_store();
        let err = store.destroy("../secrets").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId(_)));

        let err = store
            .upload(Bytes::from_static(b"hello"), "text/html")
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
