//! Storage gateway for the VodPipe pipeline.
//!
//! This crate provides:
//! - A retry/backoff utility with pluggable error classification
//! - The `ObjectStore` trait with local-filesystem and S3-compatible
//!   implementations, selected once at construction
//! - `StorageGateway`, the retry-wrapped interface the pipeline uses
//! - Opaque `StorageLocation` locator parsing

pub mod error;
pub mod gateway;
pub mod local;
pub mod location;
pub mod retry;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use gateway::StorageGateway;
pub use local::{LocalStore, LocalUrlConfig};
pub use location::StorageLocation;
pub use retry::{retry_with_backoff, ErrorClass, RetryConfig, RetryError};
pub use s3::{S3Config, S3Store};
pub use store::{BackendKind, ObjectInfo, ObjectStore, UrlPurpose};
