//! Collaborator seams the orchestrator depends on.
//!
//! Media extraction, content generation and job persistence stay behind
//! narrow async traits so the pipeline can be exercised without FFmpeg, a
//! model backend or a database.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use vodpipe_models::{GeneratedMetadata, Job, TranscriptSegment, VideoMetadata};

use crate::error::WorkerResult;

/// Extracts derived media (audio track, thumbnail frame, probe data) from
/// a source video file.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Extract the audio track as a mono 16 kHz WAV suitable for
    /// transcription. Returns the path of the written file.
    async fn extract_audio(&self, video: &Path, out_dir: &Path) -> WorkerResult<PathBuf>;

    /// Grab a single frame at the given offset as a JPEG thumbnail.
    async fn extract_frame(
        &self,
        video: &Path,
        timestamp_secs: f64,
        out_dir: &Path,
    ) -> WorkerResult<PathBuf>;

    /// Probe duration, resolution and container format.
    async fn probe(&self, video: &Path) -> WorkerResult<VideoMetadata>;
}

/// Produces transcript segments and descriptive metadata.
///
/// Implementations call out to an external model service; the pipeline
/// only sees segments and a [`GeneratedMetadata`] record.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Transcribe an audio file into timed segments.
    async fn transcribe(&self, audio: &Path) -> WorkerResult<Vec<TranscriptSegment>>;

    /// Generate title, description, tags, show notes and chapters from the
    /// plain transcript text.
    async fn generate_metadata(
        &self,
        transcript: &str,
        probed: &VideoMetadata,
    ) -> WorkerResult<GeneratedMetadata>;
}

/// Receives job snapshots after each state transition.
///
/// Snapshots arrive in transition order, the terminal one last. A failing
/// sink is logged and never fails the pipeline.
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn save(&self, job: &Job) -> WorkerResult<()>;
}

/// Sink that only logs transitions. Used by the standalone binary, where
/// the returned `Job` is the record of truth.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl JobSink for LogSink {
    async fn save(&self, job: &Job) -> WorkerResult<()> {
        debug!(
            job_id = %job.id,
            status = %job.status.as_str(),
            stage = ?job.current_stage,
            "Job transition"
        );
        Ok(())
    }
}
