//! Local filesystem backend.
//!
//! Keys are paths relative to a configured root directory. Signed URLs are
//! HMAC-SHA256 tokens appended to a configured public base URL, so a thin
//! delivery front-end can validate access without backend credentials.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::fs;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::{BackendKind, ObjectInfo, ObjectStore, UrlPurpose};

type HmacSha256 = Hmac<Sha256>;

/// Configuration for signed local delivery URLs.
#[derive(Debug, Clone, Default)]
pub struct LocalUrlConfig {
    /// Base URL the delivery front-end serves the root directory under.
    pub base_url: Option<String>,
    /// Secret for HMAC token signing.
    pub signing_secret: Option<String>,
}

impl LocalUrlConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LOCAL_DELIVERY_BASE_URL").ok(),
            signing_secret: std::env::var("LOCAL_DELIVERY_SIGNING_SECRET").ok(),
        }
    }
}

/// Local filesystem store rooted at a directory.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
    urls: LocalUrlConfig,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, urls: LocalUrlConfig) -> Self {
        Self {
            root: root.into(),
            urls,
        }
    }

    /// Resolve a key to an absolute path, rejecting traversal outside root.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(key);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(StorageError::invalid_location(format!(
                "key escapes storage root: {}",
                key
            )));
        }
        Ok(self.root.join(rel))
    }

    fn sign(&self, key: &str, purpose: UrlPurpose, expires: i64) -> StorageResult<String> {
        let secret = self.urls.signing_secret.as_deref().ok_or_else(|| {
            StorageError::SignFailed("LOCAL_DELIVERY_SIGNING_SECRET not configured".to_string())
        })?;

        let scope = match purpose {
            UrlPurpose::Get => "get",
            UrlPurpose::Put => "put",
        };
        let payload = format!("{}:{}:{}", scope, key, expires);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| StorageError::SignFailed(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn upload_file(&self, path: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        }
        fs::copy(path, &dest)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        debug!("Stored {} at {}", key, dest.display());
        Ok(())
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, _content_type: &str) -> StorageResult<()> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        }
        fs::write(&dest, data)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }

    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        let src = self.resolve(key)?;
        if !fs::try_exists(&src).await.unwrap_or(false) {
            return Err(StorageError::not_found(key));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::download_failed(e.to_string()))?;
        }
        fs::copy(&src, path)
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?;
        Ok(())
    }

    async fn read_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let src = self.resolve(key)?;
        match fs::read(&src).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(e) => Err(StorageError::download_failed(e.to_string())),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            // Walk from the deepest existing directory of the prefix
            let resolved = self.resolve(prefix)?;
            if resolved.is_dir() {
                resolved
            } else {
                resolved.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone())
            }
        };

        let mut objects = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::ListFailed(e.to_string())),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let key = path
                    .strip_prefix(&self.root)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|_| path.to_string_lossy().into_owned());
                if !key.starts_with(prefix) {
                    continue;
                }
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;
                let last_modified = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as u64);
                objects.push(ObjectInfo {
                    key,
                    size: meta.len(),
                    last_modified,
                });
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting an absent object is a no-op, matching object stores
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(e.to_string())),
        }
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let src = self.resolve(from)?;
        if !fs::try_exists(&src).await.unwrap_or(false) {
            return Err(StorageError::not_found(from));
        }
        let dest = self.resolve(to)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        }
        fs::copy(&src, &dest)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }

    async fn signed_url(
        &self,
        key: &str,
        purpose: UrlPurpose,
        ttl: Duration,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let base = self.urls.base_url.as_deref().ok_or_else(|| {
            StorageError::SignFailed("LOCAL_DELIVERY_BASE_URL not configured".to_string())
        })?;

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let sig = self.sign(key, purpose, expires)?;

        let mut url = format!(
            "{}/{}?expires={}&sig={}",
            base.trim_end_matches('/'),
            key,
            expires,
            sig
        );
        if purpose == UrlPurpose::Put {
            if let Some(ct) = content_type {
                url.push_str(&format!("&content_type={}", ct));
            }
        }
        Ok(url)
    }

    fn locator(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn signed_store(dir: &TempDir) -> LocalStore {
        LocalStore::new(
            dir.path(),
            LocalUrlConfig {
                base_url: Some("http://media.test/files".into()),
                signing_secret: Some("secret".into()),
            },
        )
    }

    #[tokio::test]
    async fn test_upload_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), LocalUrlConfig::default());

        store
            .upload_bytes(b"hello".to_vec(), "a/b/file.txt", "text/plain")
            .await
            .unwrap();
        assert!(store.exists("a/b/file.txt").await.unwrap());
        assert_eq!(store.read_bytes("a/b/file.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), LocalUrlConfig::default());
        assert!(matches!(
            store.read_bytes("missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_key_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), LocalUrlConfig::default());
        assert!(matches!(
            store.read_bytes("../outside.txt").await,
            Err(StorageError::InvalidLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), LocalUrlConfig::default());
        store.upload_bytes(b"1".to_vec(), "jobs/a/x.txt", "text/plain").await.unwrap();
        store.upload_bytes(b"2".to_vec(), "jobs/a/y.txt", "text/plain").await.unwrap();
        store.upload_bytes(b"3".to_vec(), "jobs/b/z.txt", "text/plain").await.unwrap();

        let listed = store.list("jobs/a/").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["jobs/a/x.txt", "jobs/a/y.txt"]);
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path(), LocalUrlConfig::default());
        store.delete("nope.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_url_requires_secret() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(
            dir.path(),
            LocalUrlConfig {
                base_url: Some("http://media.test".into()),
                signing_secret: None,
            },
        );
        assert!(matches!(
            store
                .signed_url("a.txt", UrlPurpose::Get, Duration::from_secs(60), None)
                .await,
            Err(StorageError::SignFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_url_shape() {
        let dir = TempDir::new().unwrap();
        let store = signed_store(&dir);
        let url = store
            .signed_url("a/b.mp4", UrlPurpose::Put, Duration::from_secs(60), Some("video/mp4"))
            .await
            .unwrap();
        assert!(url.starts_with("http://media.test/files/a/b.mp4?expires="));
        assert!(url.contains("&sig="));
        assert!(url.ends_with("&content_type=video/mp4"));
    }
}
