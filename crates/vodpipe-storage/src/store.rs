//! Storage backend abstraction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Which backend an [`ObjectStore`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    S3,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
        }
    }
}

/// What a signed URL grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPurpose {
    /// Time-limited read access
    Get,
    /// Time-limited write access
    Put,
}

/// Information about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch)
    pub last_modified: Option<u64>,
}

/// Storage backend interface.
///
/// Exactly two implementations exist (local filesystem, S3-compatible
/// object store), selected once at gateway construction time. Callers go
/// through [`crate::StorageGateway`], which adds retry and move semantics.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a file to the given key.
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Upload an in-memory buffer to the given key.
    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()>;

    /// Download an object to a file, creating parent directories.
    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()>;

    /// Read an object into memory.
    async fn read_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// List objects under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Server-side copy between keys.
    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Generate a time-limited signed URL for one object.
    async fn signed_url(
        &self,
        key: &str,
        purpose: UrlPurpose,
        ttl: Duration,
        content_type: Option<&str>,
    ) -> StorageResult<String>;

    /// The opaque locator string for a key in this backend.
    fn locator(&self, key: &str) -> String;

    /// Which backend this store talks to.
    fn backend(&self) -> BackendKind;
}
