//! Worker error types.

use thiserror::Error;
use vodpipe_models::JobId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Content generation failed: {0}")]
    ContentGenerationFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job {0} is already being processed")]
    JobBusy(JobId),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] vodpipe_storage::StorageError),

    #[error("Publish error: {0}")]
    Publish(#[from] vodpipe_publish::PublishError),

    #[error("Media error: {0}")]
    Media(#[from] vodpipe_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn content_failed(msg: impl Into<String>) -> Self {
        Self::ContentGenerationFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
