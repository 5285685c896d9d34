//! HTTP client for the external content-generation service.
//!
//! The service turns audio into transcript segments and transcripts into
//! descriptive metadata. What runs behind it is opaque to the pipeline.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vodpipe_models::{GeneratedMetadata, TranscriptSegment, VideoMetadata};

use crate::collaborators::ContentGenerator;
use crate::error::{WorkerError, WorkerResult};

/// Content service client.
#[derive(Clone)]
pub struct RemoteContentGenerator {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    segments: Vec<SegmentDto>,
}

#[derive(Debug, Deserialize)]
struct SegmentDto {
    text: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Serialize)]
struct MetadataRequest<'a> {
    transcript: &'a str,
    duration_secs: f64,
    resolution: String,
}

impl RemoteContentGenerator {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Create a client from `VODPIPE_CONTENT_URL` / `VODPIPE_CONTENT_API_KEY`.
    pub fn from_env() -> WorkerResult<Self> {
        let base_url = std::env::var("VODPIPE_CONTENT_URL")
            .map_err(|_| WorkerError::config("VODPIPE_CONTENT_URL not set"))?;
        let api_key = std::env::var("VODPIPE_CONTENT_API_KEY")
            .map_err(|_| WorkerError::config("VODPIPE_CONTENT_API_KEY not set"))?;
        Ok(Self::new(base_url, api_key))
    }

    async fn check(response: reqwest::Response) -> WorkerResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(300).collect();
        Err(WorkerError::content_failed(format!(
            "content service returned {}: {}",
            status, snippet
        )))
    }
}

#[async_trait]
impl ContentGenerator for RemoteContentGenerator {
    async fn transcribe(&self, audio: &Path) -> WorkerResult<Vec<TranscriptSegment>> {
        let bytes = tokio::fs::read(audio).await?;
        debug!("Transcribing {} bytes of audio", bytes.len());

        let response = self
            .client
            .post(format!("{}/v1/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "audio/wav")
            .body(bytes)
            .send()
            .await
            .map_err(|e| WorkerError::content_failed(e.to_string()))?;

        let parsed: TranscribeResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| WorkerError::content_failed(format!("bad transcript payload: {}", e)))?;

        Ok(parsed
            .segments
            .into_iter()
            .map(|s| TranscriptSegment::new(s.text, s.start, s.end))
            .collect())
    }

    async fn generate_metadata(
        &self,
        transcript: &str,
        probed: &VideoMetadata,
    ) -> WorkerResult<GeneratedMetadata> {
        let request = MetadataRequest {
            transcript,
            duration_secs: probed.duration_secs,
            resolution: probed.resolution(),
        };

        let response = self
            .client
            .post(format!("{}/v1/metadata", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::content_failed(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| WorkerError::content_failed(format!("bad metadata payload: {}", e)))
    }
}
