//! Publish error types.

use thiserror::Error;

use vodpipe_storage::ErrorClass;

pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upload session initiation failed: {0}")]
    InitiateFailed(String),

    /// The platform no longer recognizes the session URI. Recovery
    /// requires a fresh session from byte 0, not a resume.
    #[error("Upload session lost (HTTP {status})")]
    SessionLost { status: u16 },

    #[error("Transient upload failure (HTTP {status})")]
    Transient { status: u16 },

    #[error("Upload rejected with HTTP {status}: {body}")]
    Upload { status: u16, body: String },

    #[error("Upload abandoned after {attempts} transient failures")]
    RetriesExhausted { attempts: u32 },

    #[error("Caption upload failed: {0}")]
    Caption(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vodpipe_storage::StorageError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the caller must restart the upload from byte 0 with a
    /// fresh session rather than resuming.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, PublishError::SessionLost { .. })
    }

    /// Classifier for the shared retry utility (used for the caption
    /// side-channel, not the main chunk loop).
    pub fn classify(&self) -> ErrorClass {
        match self {
            PublishError::Transient { .. } | PublishError::Http(_) | PublishError::Io(_) => {
                ErrorClass::Retryable
            }
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lost_is_distinct_from_fatal() {
        let lost = PublishError::SessionLost { status: 404 };
        let fatal = PublishError::Upload {
            status: 403,
            body: "forbidden".into(),
        };
        assert!(lost.is_session_lost());
        assert!(!fatal.is_session_lost());
        assert_eq!(lost.classify(), ErrorClass::Fatal);
    }

    #[test]
    fn test_transient_is_retryable() {
        assert_eq!(
            PublishError::Transient { status: 503 }.classify(),
            ErrorClass::Retryable
        );
    }
}
