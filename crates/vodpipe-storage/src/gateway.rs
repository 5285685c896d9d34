//! Storage gateway: one interface over both backends, with retry.
//!
//! The gateway owns the backend selection (made once at construction) and
//! wraps every networked operation in the retry utility with the storage
//! error classifier. It also provides the non-atomic `move_object` and the
//! exists-gated GET signed URL the pipeline relies on.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::local::{LocalStore, LocalUrlConfig};
use crate::location::StorageLocation;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::s3::S3Store;
use crate::store::{BackendKind, ObjectInfo, ObjectStore, UrlPurpose};

/// Storage gateway over a single backend selected at construction time.
#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
}

impl StorageGateway {
    /// Wrap an already-constructed backend.
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Local filesystem backend rooted at `root`.
    pub fn local(root: impl Into<std::path::PathBuf>, urls: LocalUrlConfig, retry: RetryConfig) -> Self {
        Self::new(Arc::new(LocalStore::new(root, urls)), retry)
    }

    /// S3-compatible backend.
    pub fn s3(store: S3Store, retry: RetryConfig) -> Self {
        Self::new(Arc::new(store), retry)
    }

    /// Select the backend from `STORAGE_BACKEND` (`local` or `s3`).
    pub fn from_env(retry: RetryConfig) -> StorageResult<Self> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());
        match backend.as_str() {
            "local" => {
                let root = std::env::var("LOCAL_STORAGE_ROOT")
                    .map_err(|_| StorageError::config("LOCAL_STORAGE_ROOT not set"))?;
                Ok(Self::local(root, LocalUrlConfig::from_env(), retry))
            }
            "s3" => Ok(Self::s3(S3Store::from_env()?, retry)),
            other => Err(StorageError::config(format!(
                "unknown STORAGE_BACKEND '{}'",
                other
            ))),
        }
    }

    fn op_config(&self, name: &str) -> RetryConfig {
        let mut config = self.retry.clone();
        config.operation_name = name.to_string();
        config
    }

    async fn with_retry<T, F, Fut>(&self, name: &str, op: F) -> StorageResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StorageResult<T>>,
    {
        retry_with_backoff(&self.op_config(name), StorageError::classify, op)
            .await
            .map_err(|e| e.error)
    }

    pub async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        self.with_retry("upload_file", || self.store.upload_file(path, key, content_type))
            .await
    }

    pub async fn upload_bytes(&self, data: &[u8], key: &str, content_type: &str) -> StorageResult<()> {
        self.with_retry("upload_bytes", || {
            self.store.upload_bytes(data.to_vec(), key, content_type)
        })
        .await
    }

    pub async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        self.with_retry("download_file", || self.store.download_file(key, path))
            .await
    }

    pub async fn read_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.with_retry("read_bytes", || self.store.read_bytes(key)).await
    }

    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.with_retry("list", || self.store.list(prefix)).await
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.with_retry("exists", || self.store.exists(key)).await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.with_retry("delete", || self.store.delete(key)).await
    }

    /// Move an object: copy, then delete the source.
    ///
    /// NOT atomic. A crash between the two steps, or a failed source
    /// delete, leaves the object at both locations; the destination is
    /// authoritative once it exists, and callers must tolerate a surviving
    /// duplicate at the source.
    pub async fn move_object(&self, from: &str, to: &str) -> StorageResult<()> {
        self.with_retry("copy", || self.store.copy(from, to)).await?;

        if let Err(e) = self.with_retry("delete_source", || self.store.delete(from)).await {
            warn!(
                "Source delete failed after copy, duplicate remains at {}: {}",
                from, e
            );
        }
        debug!("Moved {} to {}", from, to);
        Ok(())
    }

    /// Generate a time-limited signed URL.
    ///
    /// GET URLs require the object to exist; PUT URLs are issued
    /// unconditionally with only a TTL and an optional content-type
    /// constraint.
    pub async fn signed_url(
        &self,
        key: &str,
        purpose: UrlPurpose,
        ttl: Duration,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        if purpose == UrlPurpose::Get && !self.exists(key).await? {
            return Err(StorageError::not_found(key));
        }
        self.store.signed_url(key, purpose, ttl, content_type).await
    }

    /// Materialize a source location into a local file.
    ///
    /// Local locations are copied; remote locations are downloaded by key
    /// through the configured backend. Parsing errors are fatal and raised
    /// before any I/O.
    pub async fn fetch_source(&self, location: &str, dest: &Path) -> StorageResult<()> {
        match StorageLocation::parse(location)? {
            StorageLocation::Local(path) => {
                if !fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(StorageError::not_found(location));
                }
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StorageError::download_failed(e.to_string()))?;
                }
                fs::copy(&path, dest)
                    .await
                    .map_err(|e| StorageError::download_failed(e.to_string()))?;
                Ok(())
            }
            StorageLocation::Remote { key, .. } => self.download_file(&key, dest).await,
        }
    }

    /// The opaque locator string for a key in the configured backend.
    pub fn locator(&self, key: &str) -> String {
        self.store.locator(key)
    }

    pub fn backend(&self) -> BackendKind {
        self.store.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn fast_retry() -> RetryConfig {
        RetryConfig::new("test")
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1))
    }

    fn local_gateway(dir: &TempDir) -> StorageGateway {
        StorageGateway::local(dir.path(), LocalUrlConfig::default(), fast_retry())
    }

    /// Backend wrapper that can be told to fail deletes.
    struct FlakyDelete {
        inner: LocalStore,
        fail_delete: AtomicBool,
    }

    #[async_trait]
    impl ObjectStore for FlakyDelete {
        async fn upload_file(&self, path: &Path, key: &str, ct: &str) -> StorageResult<()> {
            self.inner.upload_file(path, key, ct).await
        }
        async fn upload_bytes(&self, data: Vec<u8>, key: &str, ct: &str) -> StorageResult<()> {
            self.inner.upload_bytes(data, key, ct).await
        }
        async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()> {
            self.inner.download_file(key, path).await
        }
        async fn read_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.inner.read_bytes(key).await
        }
        async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
            self.inner.list(prefix).await
        }
        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.inner.exists(key).await
        }
        async fn delete(&self, key: &str) -> StorageResult<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StorageError::delete_failed("injected failure"));
            }
            self.inner.delete(key).await
        }
        async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
            self.inner.copy(from, to).await
        }
        async fn signed_url(
            &self,
            key: &str,
            purpose: UrlPurpose,
            ttl: Duration,
            ct: Option<&str>,
        ) -> StorageResult<String> {
            self.inner.signed_url(key, purpose, ttl, ct).await
        }
        fn locator(&self, key: &str) -> String {
            self.inner.locator(key)
        }
        fn backend(&self) -> BackendKind {
            self.inner.backend()
        }
    }

    #[tokio::test]
    async fn test_move_object_destination_authoritative() {
        let dir = TempDir::new().unwrap();
        let gateway = local_gateway(&dir);

        gateway.upload_bytes(b"data", "src.txt", "text/plain").await.unwrap();
        gateway.move_object("src.txt", "dst.txt").await.unwrap();

        assert!(gateway.exists("dst.txt").await.unwrap());
        assert!(!gateway.exists("src.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_object_tolerates_failed_source_delete() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FlakyDelete {
            inner: LocalStore::new(dir.path(), LocalUrlConfig::default()),
            fail_delete: AtomicBool::new(true),
        });
        let gateway = StorageGateway::new(store, fast_retry());

        gateway.upload_bytes(b"data", "src.txt", "text/plain").await.unwrap();
        // Move still succeeds; the duplicate at the source survives.
        gateway.move_object("src.txt", "dst.txt").await.unwrap();

        assert!(gateway.exists("dst.txt").await.unwrap());
        assert!(gateway.exists("src.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_signed_url_requires_object() {
        let dir = TempDir::new().unwrap();
        let gateway = StorageGateway::local(
            dir.path(),
            LocalUrlConfig {
                base_url: Some("http://media.test".into()),
                signing_secret: Some("secret".into()),
            },
            fast_retry(),
        );

        let err = gateway
            .signed_url("absent.mp4", UrlPurpose::Get, Duration::from_secs(60), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        // PUT URLs are unconditional.
        gateway
            .signed_url("absent.mp4", UrlPurpose::Put, Duration::from_secs(60), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_source_local_path() {
        let dir = TempDir::new().unwrap();
        let gateway = local_gateway(&dir);

        let src = dir.path().join("incoming.mp4");
        tokio::fs::write(&src, b"video bytes").await.unwrap();

        let dest = dir.path().join("work/source.mp4");
        gateway
            .fetch_source(&src.display().to_string(), &dest)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn test_fetch_source_invalid_locator_is_immediate() {
        let dir = TempDir::new().unwrap();
        let gateway = local_gateway(&dir);
        let err = gateway
            .fetch_source("s3://bucket-only", &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidLocation(_)));
    }
}
