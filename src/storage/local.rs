//! Local directory file store
//!
//! Every file lives flat under a single root directory. The root is created on first write.

use super::{check_content_size, sanitize_filename, FileStore, FileStoreError, SavedFile, StoredFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    max_file_size: usize,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<(String, PathBuf), FileStoreError> {
        let clean = sanitize_filename(name)?;
        let path = self.root.join(&clean);
        Ok((clean, path))
    }

    fn map_io(name: &str, err: std::io::Error) -> FileStoreError {
        match err.kind() {
            ErrorKind::NotFound => FileStoreError::NotFound(name.to_string()),
            _ => FileStoreError::Io(err.to_string()),
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, name: &str, content: &str) -> Result<SavedFile, FileStoreError> {
        check_content_size(content.len(), self.max_file_size)?;
        let (clean, path) = self.resolve(name)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| FileStoreError::Io(e.to_string()))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| FileStoreError::Io(e.to_string()))?;

        debug!(file = %clean, bytes = content.len(), "Saved file");

        Ok(SavedFile {
            name: clean,
            path: path.display().to_string(),
            size: content.len(),
        })
    }

    async fn read(&self, name: &str) -> Result<String, FileStoreError> {
        let (clean, path) = self.resolve(name)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Self::map_io(&clean, e))?;
        if !metadata.is_file() {
            return Err(FileStoreError::NotFound(clean));
        }
        check_content_size(metadata.len() as usize, self.max_file_size)?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Self::map_io(&clean, e))
    }

    async fn list(&self) -> Result<Vec<StoredFile>, FileStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // Nothing saved yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FileStoreError::Io(e.to_string())),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FileStoreError::Io(e.to_string()))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| FileStoreError::Io(e.to_string()))?;
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn delete(&self, name: &str) -> Result<(), FileStoreError> {
        let (clean, path) = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::map_io(&clean, e))?;
        debug!(file = %clean, "Deleted file");
        Ok(())
    }
}
