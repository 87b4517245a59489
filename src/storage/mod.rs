//! File store collaborator
//!
//! Handlers create, read, list and delete stored artifacts through the [`FileStore`]
//! trait. Names are sanitized before they reach any implementation and content above the
//! size ceiling is rejected.

pub mod local;

pub use local::LocalFileStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default content ceiling (1 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024;

/// File store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FileStoreError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Content too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl FileStoreError {
    /// Failures a handler reports back to the user instead of propagating
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, FileStoreError::Io(_))
    }
}

/// Result of a successful save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFile {
    pub name: String,
    pub path: String,
    pub size: usize,
}

/// A stored file as reported by `list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Storage backend for handler artifacts
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, name: &str, content: &str) -> Result<SavedFile, FileStoreError>;

    async fn read(&self, name: &str) -> Result<String, FileStoreError>;

    /// Stored files sorted by name
    async fn list(&self) -> Result<Vec<StoredFile>, FileStoreError>;

    async fn delete(&self, name: &str) -> Result<(), FileStoreError>;
}

/// Strip separators, traversal sequences and control characters from a file name
pub fn sanitize_filename(name: &str) -> Result<String, FileStoreError> {
    let mut cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    let cleaned = cleaned.trim().trim_start_matches('.').trim().to_string();

    if cleaned.is_empty() {
        return Err(FileStoreError::InvalidName(name.to_string()));
    }

    Ok(cleaned)
}

/// Check content size constraints (pure function)
pub fn check_content_size(content_len: usize, max_size: usize) -> Result<(), FileStoreError> {
    if content_len > max_size {
        return Err(FileStoreError::TooLarge {
            size: content_len,
            max: max_size,
        });
    }
    Ok(())
}

/// Lower-cased extension of a file name, if any
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}
