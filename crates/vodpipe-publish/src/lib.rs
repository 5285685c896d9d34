//! Resumable upload client for the external video platform.
//!
//! This crate provides:
//! - Session initiation and the chunked, resumable transfer loop
//! - Transient/SessionLost/fatal response classification with capped
//!   exponential backoff
//! - Best-effort caption uploads after the main asset
//! - An idempotency marker so re-triggered pipelines never publish twice

pub mod client;
pub mod error;
pub mod session;

pub use client::{
    CaptionFile, PlatformConfig, PublishMarker, PublishOutcome, ResumableUploadClient, VideoTarget,
};
pub use error::{PublishError, PublishResult};
pub use session::UploadSession;
