//! Video enrichment pipeline worker.
//!
//! This crate provides:
//! - The pipeline orchestrator driving one job through all stages
//! - Collaborator traits for media extraction, content generation and
//!   job persistence
//! - FFmpeg and HTTP-backed production implementations
//! - A one-shot binary that runs a single job from the command line

pub mod collaborators;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod pipeline;
pub mod remote;

pub use collaborators::{ContentGenerator, JobSink, LogSink, MediaExtractor};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use extractor::FfmpegExtractor;
pub use logging::JobLogger;
pub use pipeline::PipelineOrchestrator;
pub use remote::RemoteContentGenerator;
