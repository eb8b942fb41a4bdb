//! Content-addressed storage for uploaded image blobs.
//!
//! Blobs live under a two-level directory keyed by hash prefix:
//! `{images_dir}/{hash[0..2]}/{hash[0..8]}.{extension}`. The database row
//! (see `repository`) records the path; this module also provides the
//! `ImageStore` collaborator the pipeline fetches bytes through.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::models::{ImageStatus, StoredImage};
use crate::pipeline::{FetchError, ImageStore};
use crate::repository::ConversationRepository;

/// Construct the storage path for image content.
pub fn image_storage_path(images_dir: &Path, content_hash: &str, extension: &str) -> PathBuf {
    images_dir
        .join(&content_hash[..2])
        .join(format!("{}.{}", &content_hash[..8], extension))
}

/// Map an image MIME type to a file extension.
pub fn mime_to_extension(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/tiff" => "tif",
        _ => "bin",
    }
}

/// Image blob store backed by the local filesystem, with row metadata in
/// the conversation repository.
#[derive(Clone)]
pub struct LocalImageStore {
    repo: ConversationRepository,
    images_dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(repo: ConversationRepository, images_dir: PathBuf) -> Self {
        Self { repo, images_dir }
    }

    /// Save uploaded content to disk and record the image row.
    pub async fn save_image(
        &self,
        conversation_id: &str,
        filename: &str,
        mime_type: &str,
        content: &[u8],
    ) -> anyhow::Result<StoredImage> {
        let content_hash = StoredImage::compute_hash(content);
        let path =
            image_storage_path(&self.images_dir, &content_hash, mime_to_extension(mime_type));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        let image = StoredImage::new(
            conversation_id.to_string(),
            filename.to_string(),
            content,
            path,
            mime_type.to_string(),
        );
        self.repo.add_image(&image).await?;

        Ok(image)
    }

    /// Delete an image: remove the stored blob and the database row.
    /// Returns false when no such image exists.
    pub async fn delete_image(&self, image_id: &str) -> anyhow::Result<bool> {
        let Some(record) = self.repo.get_image(image_id).await? else {
            return Ok(false);
        };

        match tokio::fs::remove_file(&record.file_path).await {
            Ok(()) => {}
            // A missing blob should not strand the row.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.repo.delete_image(image_id).await?;
        Ok(true)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn fetch(&self, image_id: &str) -> Result<Vec<u8>, FetchError> {
        let record = self
            .repo
            .get_image(image_id)
            .await
            .map_err(|e| FetchError::Storage(e.to_string()))?
            .ok_or_else(|| FetchError::NotFound(image_id.to_string()))?;

        tokio::fs::read(&record.file_path)
            .await
            .map_err(|e| FetchError::Storage(format!("{}: {e}", record.file_path.display())))
    }

    async fn set_status(&self, image_id: &str, status: ImageStatus) -> Result<(), FetchError> {
        self.repo
            .set_image_status(image_id, status)
            .await
            .map_err(|e| FetchError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Conversation;
    use crate::repository::AsyncSqlitePool;

    #[test]
    fn test_image_storage_path() {
        let dir = Path::new("/images");
        let hash = "abcdef1234567890abcdef1234567890";
        let path = image_storage_path(dir, hash, "jpg");
        assert_eq!(path, PathBuf::from("/images/ab/abcdef12.jpg"));
    }

    #[test]
    fn test_mime_to_extension() {
        assert_eq!(mime_to_extension("image/jpeg"), "jpg");
        assert_eq!(mime_to_extension("image/png"), "png");
        assert_eq!(mime_to_extension("image/webp"), "webp");
        assert_eq!(mime_to_extension("image/tiff"), "tif");
        assert_eq!(mime_to_extension("application/pdf"), "bin");
    }

    async fn test_store() -> (tempfile::TempDir, LocalImageStore, String) {
        let dir = tempfile::tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.sqlite"));
        pool.init_schema().await.unwrap();
        let repo = ConversationRepository::new(pool);

        let conv = Conversation::new("case".to_string(), None);
        repo.create_conversation(&conv).await.unwrap();

        let store = LocalImageStore::new(repo, dir.path().join("images"));
        (dir, store, conv.id)
    }

    #[tokio::test]
    async fn test_save_then_fetch_round_trip() {
        let (_dir, store, conv_id) = test_store().await;

        let image = store
            .save_image(&conv_id, "scene.jpg", "image/jpeg", b"jpeg bytes")
            .await
            .unwrap();

        let bytes = store.fetch(&image.id).await.unwrap();
        assert_eq!(bytes, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_row() {
        let (_dir, store, conv_id) = test_store().await;

        let image = store
            .save_image(&conv_id, "scene.jpg", "image/jpeg", b"jpeg bytes")
            .await
            .unwrap();
        let path = image.file_path.clone();
        assert!(path.exists());

        assert!(store.delete_image(&image.id).await.unwrap());
        assert!(!path.exists());
        let err = store.fetch(&image.id).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));

        // Second delete is a miss, not an error.
        assert!(!store.delete_image(&image.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_not_found() {
        let (_dir, store, _conv_id) = test_store().await;
        let err = store.fetch("no-such-image").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
