//! Resumable upload client.
//!
//! Publishes a finished video to the external platform over a chunked,
//! resumable protocol: initiate a session, PUT chunks with `Content-Range`,
//! interpret 308/5xx/404 responses, and back off between transient
//! failures while resuming the same session. Captions ride along as a
//! secondary, best-effort operation.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use vodpipe_storage::{retry_with_backoff, RetryConfig, StorageError, StorageGateway};

use crate::error::{PublishError, PublishResult};
use crate::session::{offset_from_range_header, UploadSession};

/// Default chunk size (8 MiB).
const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default cap on consecutive transient failures per session.
const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 10;

/// Well-known marker filename within a source prefix.
const MARKER_FILENAME: &str = ".published.json";

/// Platform client configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform API base URL.
    pub base_url: String,
    /// Bearer token for API calls.
    pub api_token: String,
    /// Upload chunk size in bytes.
    pub chunk_size: u64,
    /// Maximum consecutive transient failures before giving up.
    pub max_transient_retries: u32,
    /// Backoff schedule between transient failures (1s doubling to 60s).
    pub backoff: RetryConfig,
    /// Retry budget for single-shot platform requests (initiate, captions).
    pub request_retry: RetryConfig,
}

impl PlatformConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            backoff: RetryConfig::new("upload_chunk")
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(60)),
            request_retry: RetryConfig::new("platform_request")
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(500)),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        let base_url = std::env::var("PLATFORM_BASE_URL")
            .map_err(|_| PublishError::config("PLATFORM_BASE_URL not set"))?;
        let api_token = std::env::var("PLATFORM_API_TOKEN")
            .map_err(|_| PublishError::config("PLATFORM_API_TOKEN not set"))?;
        Ok(Self::new(base_url, api_token))
    }
}

/// Declared metadata for the published video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoTarget {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: u32,
    pub privacy: String,
    pub made_for_kids: bool,
}

/// A subtitle file to attach after the main upload.
#[derive(Debug, Clone)]
pub struct CaptionFile {
    pub language: String,
    pub name: String,
    pub path: std::path::PathBuf,
}

/// Persisted record of a completed publish, keyed by source prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishMarker {
    pub video_id: String,
    pub published_at: DateTime<Utc>,
}

/// Result of a publish call.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Platform-assigned video id.
    pub video_id: String,
    /// True when a marker short-circuited the upload.
    pub already_published: bool,
    /// Reason captions were skipped, when they were.
    pub captions_skipped: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadComplete {
    id: String,
}

/// Outcome of one chunk (or status-query) round trip.
enum ChunkStatus {
    /// Final confirmation with the assigned id.
    Done(String),
    /// Platform confirmed bytes up to this offset.
    Progress(u64),
    /// Worth retrying against the same session.
    Transient(String),
}

/// Resumable upload client for the external video platform.
#[derive(Clone)]
pub struct ResumableUploadClient {
    http: Client,
    config: PlatformConfig,
}

impl ResumableUploadClient {
    pub fn new(config: PlatformConfig) -> PublishResult<Self> {
        // 308 is a protocol progress signal here, never a redirect to follow.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PublishError::config(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        Self::new(PlatformConfig::from_env()?)
    }

    /// The marker key for a source prefix.
    pub fn marker_key(source_prefix: &str) -> String {
        format!("{}/{}", source_prefix.trim_end_matches('/'), MARKER_FILENAME)
    }

    /// Publish a video, idempotently.
    ///
    /// Checks the publish marker first: when present, no upload calls are
    /// made and the recorded id is returned. Otherwise the main upload
    /// runs, captions are attached best-effort, and the marker is written.
    pub async fn publish(
        &self,
        storage: &StorageGateway,
        source_prefix: &str,
        video: &Path,
        target: &VideoTarget,
        captions: &[CaptionFile],
    ) -> PublishResult<PublishOutcome> {
        let marker_key = Self::marker_key(source_prefix);

        if let Some(marker) = self.read_marker(storage, &marker_key).await {
            info!(
                "Skipping publish, marker records video {} from {}",
                marker.video_id, marker.published_at
            );
            return Ok(PublishOutcome {
                video_id: marker.video_id,
                already_published: true,
                captions_skipped: None,
            });
        }

        let video_id = self.upload_video(video, target).await?;
        info!("Published video as {}", video_id);

        let captions_skipped = match self.upload_captions(&video_id, captions).await {
            Ok(()) => None,
            Err(e) => {
                // The primary asset is live; degrade instead of failing.
                warn!("Caption upload failed, continuing without: {}", e);
                Some(e.to_string())
            }
        };

        let marker = PublishMarker {
            video_id: video_id.clone(),
            published_at: Utc::now(),
        };
        if let Err(e) = self.write_marker(storage, &marker_key, &marker).await {
            warn!("Failed to write publish marker at {}: {}", marker_key, e);
        }

        Ok(PublishOutcome {
            video_id,
            already_published: false,
            captions_skipped,
        })
    }

    /// Run the main resumable upload and return the assigned video id.
    pub async fn upload_video(&self, video: &Path, target: &VideoTarget) -> PublishResult<String> {
        let total_size = tokio::fs::metadata(video).await?.len();
        if total_size == 0 {
            return Err(PublishError::config(format!(
                "refusing to publish empty file {}",
                video.display()
            )));
        }

        let session = self.initiate(target, total_size).await?;
        self.transfer(video, session).await
    }

    /// Initiate an upload session; the `Location` header is the session URI.
    async fn initiate(&self, target: &VideoTarget, total_size: u64) -> PublishResult<UploadSession> {
        let url = format!("{}/upload/videos?uploadType=resumable", self.config.base_url);

        let response = retry_with_backoff(&self.config.request_retry, PublishError::classify, || async {
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .header("X-Upload-Content-Length", total_size)
                .json(target)
                .send()
                .await
                .map_err(|e| PublishError::Http(e.to_string()))?;

            let status = resp.status();
            if status.is_server_error() {
                return Err(PublishError::Transient {
                    status: status.as_u16(),
                });
            }
            if !status.is_success() {
                return Err(PublishError::InitiateFailed(format!(
                    "HTTP {}",
                    status.as_u16()
                )));
            }
            Ok(resp)
        })
        .await
        .map_err(|e| e.error)?;

        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PublishError::InitiateFailed("response missing Location header".to_string())
            })?;

        debug!("Upload session initiated: {}", session_uri);
        Ok(UploadSession::new(session_uri, total_size))
    }

    /// The chunk loop: PUT chunks, interpret responses, back off and
    /// resume the same session on transient failures.
    async fn transfer(&self, video: &Path, mut session: UploadSession) -> PublishResult<String> {
        loop {
            // Every byte is confirmed but no final 200/201 arrived yet.
            // Only `bytes */total` status queries are valid from here; a
            // zero-length chunk would carry a malformed Content-Range.
            if session.confirmed_offset >= session.total_size {
                match self.query_offset(&session).await? {
                    ChunkStatus::Done(id) => return Ok(id),
                    ChunkStatus::Progress(offset) if offset < session.total_size => {
                        session.confirmed_offset = offset;
                    }
                    ChunkStatus::Progress(_) | ChunkStatus::Transient(_) => {
                        let failures = session.record_transient();
                        if failures > self.config.max_transient_retries {
                            return Err(PublishError::RetriesExhausted { attempts: failures });
                        }
                        let delay = self
                            .config
                            .backoff
                            .jittered(self.config.backoff.delay_for_attempt(failures));
                        debug!(
                            "Session fully stored, awaiting final confirmation in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                continue;
            }

            let start = session.confirmed_offset;
            let end = (start + self.config.chunk_size).min(session.total_size);
            let chunk = read_chunk(video, start, end).await?;

            let result = self
                .http
                .put(&session.session_uri)
                .bearer_auth(&self.config.api_token)
                .header(CONTENT_LENGTH, chunk.len())
                .header(
                    CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end - 1, session.total_size),
                )
                .body(chunk)
                .send()
                .await;

            match self.interpret(result, Some(end)).await? {
                ChunkStatus::Done(id) => return Ok(id),
                ChunkStatus::Progress(offset) => {
                    debug!("Upload progress: {}/{} bytes", offset, session.total_size);
                    session.confirm(offset);
                }
                ChunkStatus::Transient(reason) => {
                    let failures = session.record_transient();
                    if failures > self.config.max_transient_retries {
                        return Err(PublishError::RetriesExhausted { attempts: failures });
                    }
                    let delay = self
                        .config
                        .backoff
                        .jittered(self.config.backoff.delay_for_attempt(failures));
                    warn!(
                        "Transient upload failure ({}), resuming session in {:?} (attempt {}/{})",
                        reason, delay, failures, self.config.max_transient_retries
                    );
                    tokio::time::sleep(delay).await;

                    match self.query_offset(&session).await? {
                        ChunkStatus::Done(id) => return Ok(id),
                        // Status-query progress does not reset the failure
                        // streak; only a successful transfer does.
                        ChunkStatus::Progress(offset) => {
                            session.confirmed_offset = offset.min(session.total_size);
                        }
                        ChunkStatus::Transient(_) => {}
                    }
                }
            }
        }
    }

    /// Ask the platform how much of the session it has stored.
    async fn query_offset(&self, session: &UploadSession) -> PublishResult<ChunkStatus> {
        let result = self
            .http
            .put(&session.session_uri)
            .bearer_auth(&self.config.api_token)
            .header(CONTENT_LENGTH, 0u64)
            .header(CONTENT_RANGE, format!("bytes */{}", session.total_size))
            .send()
            .await;

        self.interpret(result, None).await
    }

    /// Map one HTTP round trip onto the protocol state machine.
    ///
    /// `sent_end` is the exclusive end of the chunk just sent, used when a
    /// 308 comes back without a `Range` header; `None` for status queries,
    /// where a bare 308 means nothing is stored yet.
    async fn interpret(
        &self,
        result: Result<Response, reqwest::Error>,
        sent_end: Option<u64>,
    ) -> PublishResult<ChunkStatus> {
        let response = match result {
            Ok(resp) => resp,
            // Connection-level failures are transient by definition.
            Err(e) => return Ok(ChunkStatus::Transient(e.to_string())),
        };

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let done: UploadComplete = response.json().await.map_err(|e| {
                    PublishError::Upload {
                        status: status.as_u16(),
                        body: format!("unparseable completion body: {}", e),
                    }
                })?;
                Ok(ChunkStatus::Done(done.id))
            }
            StatusCode::PERMANENT_REDIRECT => {
                // 308 Resume Incomplete
                let offset = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(offset_from_range_header)
                    .or(sent_end)
                    .unwrap_or(0);
                Ok(ChunkStatus::Progress(offset))
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(PublishError::SessionLost {
                status: status.as_u16(),
            }),
            s if s.is_server_error() => Ok(ChunkStatus::Transient(format!("HTTP {}", s.as_u16()))),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(PublishError::Upload {
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }

    /// Upload caption files on a small independent retry budget.
    async fn upload_captions(&self, video_id: &str, captions: &[CaptionFile]) -> PublishResult<()> {
        for caption in captions {
            let body = tokio::fs::read(&caption.path).await?;
            let url = format!("{}/upload/captions", self.config.base_url);

            retry_with_backoff(&self.config.request_retry, PublishError::classify, || {
                let body = body.clone();
                let url = url.clone();
                async move {
                    let resp = self
                        .http
                        .post(&url)
                        .query(&[
                            ("videoId", video_id),
                            ("language", &caption.language),
                            ("name", &caption.name),
                        ])
                        .bearer_auth(&self.config.api_token)
                        .body(body)
                        .send()
                        .await
                        .map_err(|e| PublishError::Http(e.to_string()))?;

                    let status = resp.status();
                    if status.is_server_error() {
                        return Err(PublishError::Transient {
                            status: status.as_u16(),
                        });
                    }
                    if !status.is_success() {
                        return Err(PublishError::Caption(format!(
                            "{} rejected with HTTP {}",
                            caption.name,
                            status.as_u16()
                        )));
                    }
                    Ok(())
                }
            })
            .await
            .map_err(|e| e.error)?;

            debug!("Uploaded caption {} ({})", caption.name, caption.language);
        }
        Ok(())
    }

    async fn read_marker(&self, storage: &StorageGateway, key: &str) -> Option<PublishMarker> {
        match storage.read_bytes(key).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(marker) => Some(marker),
                Err(e) => {
                    warn!("Ignoring unreadable publish marker at {}: {}", key, e);
                    None
                }
            },
            Err(StorageError::NotFound(_)) => None,
            Err(e) => {
                warn!("Marker lookup failed at {}, proceeding with publish: {}", key, e);
                None
            }
        }
    }

    async fn write_marker(
        &self,
        storage: &StorageGateway,
        key: &str,
        marker: &PublishMarker,
    ) -> PublishResult<()> {
        let bytes = serde_json::to_vec(marker)?;
        storage.upload_bytes(&bytes, key, "application/json").await?;
        Ok(())
    }
}

/// Read the byte range `[start, end)` of a file.
async fn read_chunk(path: &Path, start: u64, end: u64) -> PublishResult<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let mut buf = Vec::with_capacity((end - start) as usize);
    file.take(end - start).read_to_end(&mut buf).await?;
    Ok(buf)
}
