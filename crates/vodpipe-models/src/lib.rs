//! Shared data models for the VodPipe backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and the stage state machine
//! - Pipeline stages and output catalog
//! - Transcript segments and subtitle (VTT/SRT) formatting
//! - Probed and AI-generated video metadata

pub mod job;
pub mod metadata;
pub mod stage;
pub mod subtitle;

// Re-export common types
pub use job::{Job, JobId, JobStatus, SourceVideo};
pub use metadata::{Chapter, GeneratedMetadata, VideoMetadata};
pub use stage::{OutputKind, Stage};
pub use subtitle::{format_srt, format_vtt, TranscriptSegment};
