//! Manuscript upload storage
//!
//! Files are stored flat under the configured directory and named by the
//! SHA-256 of their content plus the lowercased original extension, so
//! re-uploading identical bytes reuses the same file.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file written by [`UploadStore::store`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Name relative to the upload directory, as recorded on the paper
    pub file_name: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    allowed: Vec<String>,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, allowed: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            allowed: allowed.into_iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.allowed_extensions.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lowercased extension of `original_name` if it is accepted
    pub fn allowed_extension(&self, original_name: &str) -> Result<String> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !extension.is_empty() && self.allowed.contains(&extension) {
            Ok(extension)
        } else {
            Err(AppError::UnsupportedFileType {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    extension
                },
                allowed: self.allowed.join(", "),
            })
        }
    }

    /// Validate and persist an uploaded file
    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        let extension = self.allowed_extension(original_name)?;

        if bytes.is_empty() {
            return Err(AppError::MissingField {
                field: "file".to_string(),
            });
        }

        let file_name = format!("{}.{}", content_digest(bytes), extension);
        let path = self.dir.join(&file_name);

        tokio::fs::create_dir_all(&self.dir).await?;
        if tokio::fs::try_exists(&path).await? {
            debug!(file_name = %file_name, "Upload already stored");
        } else {
            tokio::fs::write(&path, bytes).await?;
            debug!(file_name = %file_name, size = bytes.len(), "Upload stored");
        }

        Ok(StoredFile {
            file_name,
            size: bytes.len(),
        })
    }
}

/// Hex SHA-256 of the given bytes
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
