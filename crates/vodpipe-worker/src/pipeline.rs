//! The pipeline orchestrator.
//!
//! Owns one `Job` at a time from Download through Complete: fetches the
//! source, derives artifacts through the collaborator seams, uploads them
//! via the storage gateway and optionally publishes to the external
//! platform. All mutation of the job record happens here; persistence is
//! notified after each transition but never consulted.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::time::timeout;
use tracing::{info, warn};

use vodpipe_models::{
    subtitle, GeneratedMetadata, Job, JobId, JobStatus, OutputKind, Stage, TranscriptSegment,
    VideoMetadata,
};
use vodpipe_publish::{CaptionFile, ResumableUploadClient, VideoTarget};
use vodpipe_storage::StorageGateway;

use crate::collaborators::{ContentGenerator, JobSink, MediaExtractor};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Artifacts produced so far within one run, all scoped to the per-job
/// workspace directory. Derived lazily so a stage re-entered on resume can
/// rebuild what it needs without re-recording completions.
#[derive(Default)]
struct StageContext {
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    probed: Option<VideoMetadata>,
    segments: Option<Vec<TranscriptSegment>>,
    metadata: Option<GeneratedMetadata>,
    outputs: Vec<(OutputKind, PathBuf)>,
    degraded: Vec<String>,
}

impl StageContext {
    fn output_path(&self, kind: OutputKind) -> Option<&PathBuf> {
        self.outputs.iter().find(|(k, _)| *k == kind).map(|(_, p)| p)
    }
}

/// Drives one job through the stage sequence.
pub struct PipelineOrchestrator {
    storage: StorageGateway,
    extractor: Arc<dyn MediaExtractor>,
    generator: Arc<dyn ContentGenerator>,
    sink: Arc<dyn JobSink>,
    publisher: Option<ResumableUploadClient>,
    config: WorkerConfig,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the job id from the in-flight set on every exit path.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.id);
    }
}

impl PipelineOrchestrator {
    pub fn new(
        storage: StorageGateway,
        extractor: Arc<dyn MediaExtractor>,
        generator: Arc<dyn ContentGenerator>,
        sink: Arc<dyn JobSink>,
        publisher: Option<ResumableUploadClient>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            extractor,
            generator,
            sink,
            publisher,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Run a job to a terminal status.
    ///
    /// Returns the final job record; stage failures are captured on the
    /// job as `Failed` rather than surfaced as `Err`. `Err` means the run
    /// never started (duplicate invocation, workspace setup).
    pub async fn run(&self, mut job: Job) -> WorkerResult<Job> {
        let _guard = self.acquire(&job.id)?;

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let workspace = tempfile::tempdir_in(&self.config.work_dir)?;

        let logger = JobLogger::new(&job.id, "pipeline");
        logger.log_start(&format!("source {}", job.source.location));

        job.start();
        self.notify(&job).await;

        let mut ctx = StageContext::default();
        for stage in Stage::sequence(self.publish_active()) {
            if job.is_stage_completed(stage) {
                logger.log_progress(&format!("stage {} already completed, skipping", stage));
                continue;
            }
            job.move_to_stage(stage);
            match self.run_stage(stage, &job, workspace.path(), &mut ctx).await {
                Ok(()) => {
                    job.complete_current_stage();
                    self.record_outputs(&mut job, &ctx);
                    self.notify(&job).await;
                }
                Err(e) => {
                    let msg = format!("stage {} failed: {}", stage, e);
                    logger.log_error(&msg);
                    job.update_status(JobStatus::Failed, Some(&msg));
                    self.notify(&job).await;
                    return Ok(job);
                }
            }
        }

        if ctx.degraded.is_empty() {
            job.update_status(JobStatus::Completed, None);
        } else {
            let reason = ctx.degraded.join("; ");
            job.update_status(JobStatus::Partial, Some(&reason));
        }
        self.notify(&job).await;
        logger.log_completion(&format!("finished with status {}", job.status.as_str()));
        Ok(job)
    }

    fn publish_active(&self) -> bool {
        self.config.publish_enabled && self.publisher.is_some()
    }

    fn acquire(&self, id: &JobId) -> WorkerResult<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(id.to_string()) {
            return Err(WorkerError::JobBusy(id.clone()));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    /// Persistence notification. Snapshots are delivered in transition
    /// order; a failing sink logs a warning and never fails the pipeline.
    async fn notify(&self, job: &Job) {
        if let Err(e) = self.sink.save(job).await {
            warn!(job_id = %job.id, "Job sink save failed: {}", e);
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        job: &Job,
        ws: &Path,
        ctx: &mut StageContext,
    ) -> WorkerResult<()> {
        info!(job_id = %job.id, stage = %stage, "Running stage");
        match stage {
            Stage::Download => {
                self.ensure_video(job, ws, ctx).await?;
                Ok(())
            }
            Stage::ExtractAudio => {
                self.ensure_audio(job, ws, ctx).await?;
                // Probe up front so thumbnail timing has a duration later.
                self.ensure_probe(job, ws, ctx).await?;
                Ok(())
            }
            Stage::GenerateTranscript => {
                let segments = self.ensure_segments(job, ws, ctx).await?;
                let text = subtitle::plain_text(&segments);
                let path = ws.join(OutputKind::Transcript.filename());
                tokio::fs::write(&path, text).await?;
                ctx.outputs.push((OutputKind::Transcript, path));
                Ok(())
            }
            Stage::GenerateSubtitles => {
                let segments = self.ensure_segments(job, ws, ctx).await?;
                let vtt = ws.join(OutputKind::SubtitlesVtt.filename());
                tokio::fs::write(&vtt, subtitle::format_vtt(&segments)).await?;
                ctx.outputs.push((OutputKind::SubtitlesVtt, vtt));

                let srt = ws.join(OutputKind::SubtitlesSrt.filename());
                tokio::fs::write(&srt, subtitle::format_srt(&segments)).await?;
                ctx.outputs.push((OutputKind::SubtitlesSrt, srt));
                Ok(())
            }
            Stage::GenerateMetadata => {
                let metadata = self.ensure_metadata(job, ws, ctx).await?;

                let notes = ws.join(OutputKind::ShowNotes.filename());
                tokio::fs::write(&notes, &metadata.show_notes).await?;
                ctx.outputs.push((OutputKind::ShowNotes, notes));

                let chapters = ws.join(OutputKind::Chapters.filename());
                tokio::fs::write(&chapters, metadata.format_chapters()).await?;
                ctx.outputs.push((OutputKind::Chapters, chapters));
                Ok(())
            }
            Stage::GenerateThumbnail => {
                let video = self.ensure_video(job, ws, ctx).await?;
                let probed = self.ensure_probe(job, ws, ctx).await?;
                let ts = self
                    .config
                    .thumbnail_timestamp_secs
                    .clamp(0.0, probed.duration_secs);
                let path = self
                    .with_timeout(
                        "thumbnail extraction",
                        self.extractor.extract_frame(&video, ts, ws),
                    )
                    .await?;
                ctx.outputs.push((OutputKind::Thumbnail, path));
                Ok(())
            }
            Stage::UploadOutputs => self.upload_outputs(job, ctx).await,
            Stage::Publish => self.publish_stage(job, ws, ctx).await,
            Stage::Complete => Ok(()),
        }
    }

    /// Best-effort artifact upload. Individual failures degrade the job to
    /// Partial; the stage itself fails only when nothing uploads.
    async fn upload_outputs(&self, job: &Job, ctx: &mut StageContext) -> WorkerResult<()> {
        let mut failures = Vec::new();
        let mut uploaded = Vec::new();

        for (kind, path) in &ctx.outputs {
            let key = format!(
                "{}/{}/{}",
                self.config.output_prefix,
                job.id,
                kind.filename()
            );
            match self
                .with_timeout(
                    "output upload",
                    self.storage.upload_file(path, &key, kind.content_type()),
                )
                .await
            {
                Ok(()) => uploaded.push(*kind),
                Err(e) => {
                    warn!(job_id = %job.id, kind = %kind, "Output upload failed: {}", e);
                    failures.push(format!("{}: {}", kind, e));
                }
            }
        }

        ctx.outputs.retain(|(k, _)| uploaded.contains(k));

        if !failures.is_empty() {
            if uploaded.is_empty() {
                return Err(WorkerError::upload_failed(format!(
                    "all {} outputs failed: {}",
                    failures.len(),
                    failures.join("; ")
                )));
            }
            ctx.degraded.push(format!(
                "{} output(s) failed to upload: {}",
                failures.len(),
                failures.join("; ")
            ));
        }
        Ok(())
    }

    /// Record storage locators for every output that made it up.
    fn record_outputs(&self, job: &mut Job, ctx: &StageContext) {
        if !job.is_stage_completed(Stage::UploadOutputs) {
            return;
        }
        for (kind, _) in &ctx.outputs {
            if job.output_files.contains_key(kind) {
                continue;
            }
            let key = format!(
                "{}/{}/{}",
                self.config.output_prefix,
                job.id,
                kind.filename()
            );
            job.record_output(*kind, self.storage.locator(&key));
        }
    }

    async fn publish_stage(&self, job: &Job, ws: &Path, ctx: &mut StageContext) -> WorkerResult<()> {
        let Some(publisher) = &self.publisher else {
            return Ok(());
        };

        let video = self.ensure_video(job, ws, ctx).await?;
        let metadata = self.ensure_metadata(job, ws, ctx).await?;

        let mut description = metadata.description.clone();
        if !metadata.chapters.is_empty() {
            description.push_str("\n\nChapters:\n");
            description.push_str(&metadata.format_chapters());
        }
        let target = VideoTarget {
            title: metadata.title.clone(),
            description,
            tags: metadata.tags.clone(),
            category_id: 22,
            privacy: "private".to_string(),
            made_for_kids: false,
        };

        let captions: Vec<CaptionFile> = ctx
            .output_path(OutputKind::SubtitlesVtt)
            .map(|path| {
                vec![CaptionFile {
                    language: "en".to_string(),
                    name: "English".to_string(),
                    path: path.clone(),
                }]
            })
            .unwrap_or_default();

        let prefix = format!("{}/{}", self.config.output_prefix, job.id);
        let outcome = match publisher
            .publish(&self.storage, &prefix, &video, &target, &captions)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_session_lost() => {
                // The old session is gone for good; one fresh attempt
                // restarts the upload from byte 0.
                warn!(job_id = %job.id, "Upload session lost, restarting once: {}", e);
                publisher
                    .publish(&self.storage, &prefix, &video, &target, &captions)
                    .await?
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(reason) = outcome.captions_skipped {
            ctx.degraded.push(format!("captions skipped: {}", reason));
        }
        info!(
            job_id = %job.id,
            video_id = %outcome.video_id,
            already_published = outcome.already_published,
            "Publish stage done"
        );
        Ok(())
    }

    async fn ensure_video(
        &self,
        job: &Job,
        ws: &Path,
        ctx: &mut StageContext,
    ) -> WorkerResult<PathBuf> {
        if let Some(path) = &ctx.video {
            return Ok(path.clone());
        }
        let name = job
            .source
            .location
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("source.bin");
        let dest = ws.join(name);
        self.with_timeout(
            "source fetch",
            self.storage.fetch_source(&job.source.location, &dest),
        )
        .await?;
        ctx.video = Some(dest.clone());
        Ok(dest)
    }

    async fn ensure_audio(
        &self,
        job: &Job,
        ws: &Path,
        ctx: &mut StageContext,
    ) -> WorkerResult<PathBuf> {
        if let Some(path) = &ctx.audio {
            return Ok(path.clone());
        }
        let video = self.ensure_video(job, ws, ctx).await?;
        let audio = self
            .with_timeout("audio extraction", self.extractor.extract_audio(&video, ws))
            .await?;
        ctx.audio = Some(audio.clone());
        Ok(audio)
    }

    async fn ensure_probe(
        &self,
        job: &Job,
        ws: &Path,
        ctx: &mut StageContext,
    ) -> WorkerResult<VideoMetadata> {
        if let Some(probed) = &ctx.probed {
            return Ok(probed.clone());
        }
        let video = self.ensure_video(job, ws, ctx).await?;
        let probed = self
            .with_timeout("media probe", self.extractor.probe(&video))
            .await?;
        ctx.probed = Some(probed.clone());
        Ok(probed)
    }

    async fn ensure_segments(
        &self,
        job: &Job,
        ws: &Path,
        ctx: &mut StageContext,
    ) -> WorkerResult<Vec<TranscriptSegment>> {
        if let Some(segments) = &ctx.segments {
            return Ok(segments.clone());
        }
        let audio = self.ensure_audio(job, ws, ctx).await?;
        let segments = self
            .with_timeout("transcription", self.generator.transcribe(&audio))
            .await?;
        ctx.segments = Some(segments.clone());
        Ok(segments)
    }

    async fn ensure_metadata(
        &self,
        job: &Job,
        ws: &Path,
        ctx: &mut StageContext,
    ) -> WorkerResult<GeneratedMetadata> {
        if let Some(metadata) = &ctx.metadata {
            return Ok(metadata.clone());
        }
        let segments = self.ensure_segments(job, ws, ctx).await?;
        let probed = self.ensure_probe(job, ws, ctx).await?;
        let text = subtitle::plain_text(&segments);
        let metadata = self
            .with_timeout(
                "metadata generation",
                self.generator.generate_metadata(&text, &probed),
            )
            .await?;
        ctx.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Per-call timeout. Applies to each external interaction, never to
    /// the pipeline as a whole.
    async fn with_timeout<T, E, F>(&self, what: &str, fut: F) -> WorkerResult<T>
    where
        F: Future<Output = Result<T, E>>,
        WorkerError: From<E>,
    {
        match timeout(self.config.call_timeout, fut).await {
            Ok(result) => result.map_err(WorkerError::from),
            Err(_) => Err(WorkerError::Timeout {
                what: what.to_string(),
                secs: self.config.call_timeout.as_secs(),
            }),
        }
    }
}
