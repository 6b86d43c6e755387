use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `FileUploadReceipt` used across Arca components.
pub struct FileUploadReceipt {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `DirectoryRecord` used across Arca components.
pub struct DirectoryRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
    pub total_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `DirectoryReceipt` used across Arca components.
pub struct DirectoryReceipt {
    pub directory_id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `FileRecord` used across Arca components.
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub hash: String,
}

#[derive(Debug, Error)]
/// Enumerates supported `StorageError` values.
pub enum StorageError {
    #[error("missing client credentials")]
    MissingCredentials,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage API returned non-success status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Trait contract for `StorageBackend` behavior.
pub trait StorageBackend: Send + Sync {
    /// Uploads `bytes` under `file_name`. An explicit `directory_id` selects
    /// the target directory; `None` uploads outside any directory and the
    /// configured default is not applied.
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        directory_id: Option<&str>,
    ) -> Result<FileUploadReceipt, StorageError>;

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;

    async fn list_directories(&self) -> Result<Vec<DirectoryRecord>, StorageError>;

    async fn create_directory(
        &self,
        name: &str,
        description: &str,
    ) -> Result<DirectoryReceipt, StorageError>;

    async fn list_files(&self, directory_id: &str) -> Result<Vec<FileRecord>, StorageError>;

    /// Directory applied by callers that fall back to a configured default
    /// (the backup path does, the plain upload path does not).
    fn default_directory_id(&self) -> Option<&str> {
        None
    }
}
