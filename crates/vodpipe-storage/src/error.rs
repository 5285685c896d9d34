//! Storage error types and retry classification.

use thiserror::Error;

use crate::retry::ErrorClass;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage location: {0}")]
    InvalidLocation(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("URL signing failed: {0}")]
    SignFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::InvalidLocation(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify for retry purposes.
    ///
    /// Connectivity and backend failures are worth retrying; not-found,
    /// permission and configuration problems are not.
    pub fn classify(&self) -> ErrorClass {
        match self {
            StorageError::NotFound(_)
            | StorageError::PermissionDenied(_)
            | StorageError::InvalidLocation(_)
            | StorageError::SignFailed(_)
            | StorageError::Config(_)
            | StorageError::Json(_) => ErrorClass::Fatal,
            StorageError::UploadFailed(_)
            | StorageError::DownloadFailed(_)
            | StorageError::DeleteFailed(_)
            | StorageError::ListFailed(_)
            | StorageError::Backend(_)
            | StorageError::Io(_) => ErrorClass::Retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_fatal() {
        assert_eq!(
            StorageError::not_found("a/b.mp4").classify(),
            ErrorClass::Fatal
        );
        assert_eq!(
            StorageError::PermissionDenied("a/b.mp4".into()).classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_connectivity_is_retryable() {
        assert_eq!(
            StorageError::upload_failed("connection reset").classify(),
            ErrorClass::Retryable
        );
        assert_eq!(
            StorageError::Backend("503 Service Unavailable".into()).classify(),
            ErrorClass::Retryable
        );
    }
}
