//! FFmpeg-backed [`MediaExtractor`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use vodpipe_media::{MediaError, MediaToolkit};
use vodpipe_models::VideoMetadata;

use crate::collaborators::MediaExtractor;
use crate::error::{WorkerError, WorkerResult};

/// The production extractor, delegating to the ffmpeg/ffprobe toolkit.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    toolkit: MediaToolkit,
}

impl FfmpegExtractor {
    /// Locate ffmpeg and ffprobe on PATH.
    pub fn discover() -> WorkerResult<Self> {
        Ok(Self {
            toolkit: MediaToolkit::discover()?,
        })
    }

    pub fn new(toolkit: MediaToolkit) -> Self {
        Self { toolkit }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.toolkit = self.toolkit.with_timeout(timeout);
        self
    }
}

/// Tool failures during a running job are extraction failures, whatever
/// the underlying cause. `MediaError` leaks through only from setup
/// (`discover`).
fn extraction(e: MediaError) -> WorkerError {
    WorkerError::extraction_failed(e.to_string())
}

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    async fn extract_audio(&self, video: &Path, out_dir: &Path) -> WorkerResult<PathBuf> {
        self.toolkit
            .extract_audio(video, out_dir)
            .await
            .map_err(extraction)
    }

    async fn extract_frame(
        &self,
        video: &Path,
        timestamp_secs: f64,
        out_dir: &Path,
    ) -> WorkerResult<PathBuf> {
        self.toolkit
            .extract_frame(video, timestamp_secs, out_dir)
            .await
            .map_err(extraction)
    }

    async fn probe(&self, video: &Path) -> WorkerResult<VideoMetadata> {
        self.toolkit.probe(video).await.map_err(extraction)
    }
}
