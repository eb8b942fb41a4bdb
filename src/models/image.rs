//! Stored image models.
//!
//! Image content is stored content-addressed on disk (see `crate::storage`);
//! the database row keeps the path, hash, and processing status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Processing status of an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An image uploaded into a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    pub id: String,
    pub conversation_id: String,
    /// Original filename from the upload.
    pub filename: String,
    /// Path to the stored blob on disk.
    pub file_path: PathBuf,
    /// SHA-256 hash of the content.
    pub content_hash: String,
    pub mime_type: String,
    pub file_size: u64,
    pub status: ImageStatus,
    pub created_at: DateTime<Utc>,
}

impl StoredImage {
    /// Compute SHA-256 hash of content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Create a new image record for freshly uploaded content.
    pub fn new(
        conversation_id: String,
        filename: String,
        content: &[u8],
        file_path: PathBuf,
        mime_type: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            filename,
            file_path,
            content_hash: Self::compute_hash(content),
            mime_type,
            file_size: content.len() as u64,
            status: ImageStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
