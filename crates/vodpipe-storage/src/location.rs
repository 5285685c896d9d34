//! Storage location parsing.
//!
//! A location is an opaque locator string: either a local filesystem path
//! or a `scheme://bucket/key` cloud object locator. This crate is the only
//! component that interprets the string.

use std::fmt;
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};

/// A parsed storage locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Local filesystem path
    Local(PathBuf),
    /// Cloud object locator
    Remote {
        scheme: String,
        bucket: String,
        key: String,
    },
}

impl StorageLocation {
    /// Parse an opaque locator string.
    ///
    /// Strings containing `://` split into scheme, bucket and key on the
    /// first `/` after the scheme is stripped. A missing bucket or key
    /// segment is a configuration error raised immediately, never retried.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let Some((scheme, rest)) = raw.split_once("://") else {
            if raw.is_empty() {
                return Err(StorageError::invalid_location("empty location"));
            }
            return Ok(StorageLocation::Local(PathBuf::from(raw)));
        };

        let Some((bucket, key)) = rest.split_once('/') else {
            return Err(StorageError::invalid_location(format!(
                "missing key segment in '{}'",
                raw
            )));
        };
        if bucket.is_empty() {
            return Err(StorageError::invalid_location(format!(
                "missing bucket segment in '{}'",
                raw
            )));
        }
        if key.is_empty() {
            return Err(StorageError::invalid_location(format!(
                "missing key segment in '{}'",
                raw
            )));
        }

        Ok(StorageLocation::Remote {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// The object key (remote) or path string (local).
    pub fn key(&self) -> String {
        match self {
            StorageLocation::Local(path) => path.display().to_string(),
            StorageLocation::Remote { key, .. } => key.clone(),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Local(path) => write!(f, "{}", path.display()),
            StorageLocation::Remote { scheme, bucket, key } => {
                write!(f, "{}://{}/{}", scheme, bucket, key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_path() {
        let loc = StorageLocation::parse("/tmp/videos/episode.mp4").unwrap();
        assert_eq!(loc, StorageLocation::Local(PathBuf::from("/tmp/videos/episode.mp4")));
    }

    #[test]
    fn test_parse_remote_splits_on_first_slash() {
        let loc = StorageLocation::parse("s3://my-bucket/uploads/2024/episode.mp4").unwrap();
        assert_eq!(
            loc,
            StorageLocation::Remote {
                scheme: "s3".into(),
                bucket: "my-bucket".into(),
                key: "uploads/2024/episode.mp4".into(),
            }
        );
    }

    #[test]
    fn test_missing_key_is_invalid() {
        assert!(matches!(
            StorageLocation::parse("s3://my-bucket"),
            Err(StorageError::InvalidLocation(_))
        ));
        assert!(matches!(
            StorageLocation::parse("s3://my-bucket/"),
            Err(StorageError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_missing_bucket_is_invalid() {
        assert!(matches!(
            StorageLocation::parse("s3:///key"),
            Err(StorageError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_roundtrip_display() {
        let raw = "gs://bucket/a/b/c.txt";
        assert_eq!(StorageLocation::parse(raw).unwrap().to_string(), raw);
    }
}
