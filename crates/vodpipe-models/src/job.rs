//! Job record and stage state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::stage::{OutputKind, Stage};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, waiting for orchestrator pickup
    #[default]
    Pending,
    /// Job is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Primary work succeeded but some artifacts were skipped
    Partial,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Partial
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to the uploaded source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVideo {
    /// Local path or `scheme://bucket/key` storage locator
    pub location: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// MIME type
    pub content_type: String,
}

impl SourceVideo {
    pub fn new(location: impl Into<String>, size_bytes: u64, content_type: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            size_bytes,
            content_type: content_type.into(),
        }
    }
}

/// The mutable record tracking one video's progress through all stages.
///
/// A job is created once per uploaded video and exclusively owned by the
/// pipeline orchestrator for its lifetime. Persistence is a collaborator
/// notified after each transition, never a shared mutator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source video reference
    pub source: SourceVideo,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// The stage currently in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,

    /// Stages that have finished, in execution order. Append-only; a stage
    /// is added exactly once even if re-entered on resume.
    #[serde(default)]
    pub completed_stages: Vec<Stage>,

    /// Logical output name -> storage location
    #[serde(default)]
    pub output_files: BTreeMap<OutputKind, String>,

    /// Error message (set only on terminal failure or partial degradation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp (refreshed on every mutation)
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job for an uploaded video.
    pub fn new(source: SourceVideo) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source,
            status: JobStatus::Pending,
            current_stage: None,
            completed_stages: Vec::new(),
            output_files: BTreeMap::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job as picked up by the orchestrator.
    ///
    /// A crash can leave a stale in-flight stage on the record; pickup
    /// resets it so `move_to_stage` never credits unfinished work to
    /// `completed_stages`.
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.current_stage = None;
        self.touch();
    }

    /// Append the in-flight stage to `completed_stages` if absent.
    pub fn complete_current_stage(&mut self) {
        if let Some(stage) = self.current_stage {
            if !self.completed_stages.contains(&stage) {
                self.completed_stages.push(stage);
            }
            self.touch();
        }
    }

    /// Advance to the next stage, completing the current one first.
    pub fn move_to_stage(&mut self, next: Stage) {
        self.complete_current_stage();
        self.current_stage = Some(next);
        self.touch();
    }

    /// Check whether a stage has already run to completion.
    ///
    /// Used by the orchestrator to skip finished work when resuming a job
    /// after a crash.
    pub fn is_stage_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Set the status. This is the only writer of `error_message`.
    pub fn update_status(&mut self, status: JobStatus, error: Option<&str>) {
        self.status = status;
        if let Some(msg) = error {
            self.error_message = Some(msg.to_string());
        }
        self.touch();
    }

    /// Record a derived output's storage location.
    pub fn record_output(&mut self, kind: OutputKind, location: impl Into<String>) {
        self.output_files.insert(kind, location.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::new(SourceVideo::new("/tmp/episode.mp4", 1024, "video/mp4"))
    }

    #[test]
    fn test_job_creation() {
        let job = test_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.current_stage.is_none());
        assert!(job.completed_stages.is_empty());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_stage_progression() {
        let mut job = test_job();
        job.start();
        assert_eq!(job.status, JobStatus::Processing);

        job.move_to_stage(Stage::Download);
        assert_eq!(job.current_stage, Some(Stage::Download));
        assert!(job.completed_stages.is_empty());

        job.move_to_stage(Stage::ExtractAudio);
        assert_eq!(job.current_stage, Some(Stage::ExtractAudio));
        assert_eq!(job.completed_stages, vec![Stage::Download]);

        job.complete_current_stage();
        assert_eq!(job.completed_stages, vec![Stage::Download, Stage::ExtractAudio]);
    }

    #[test]
    fn test_stage_completed_exactly_once_on_reentry() {
        let mut job = test_job();
        job.move_to_stage(Stage::Download);
        job.complete_current_stage();
        job.complete_current_stage();
        assert_eq!(job.completed_stages, vec![Stage::Download]);
        assert!(job.is_stage_completed(Stage::Download));
        assert!(!job.is_stage_completed(Stage::ExtractAudio));
    }

    #[test]
    fn test_start_clears_stale_in_flight_stage() {
        let mut job = test_job();
        job.move_to_stage(Stage::Download);
        job.complete_current_stage();
        job.move_to_stage(Stage::ExtractAudio);
        job.complete_current_stage();
        // Simulates a crash mid-transcription: the stage is in flight but
        // never finished.
        job.move_to_stage(Stage::GenerateTranscript);

        job.start();
        assert!(job.current_stage.is_none());

        // Re-entering the interrupted stage must not credit it.
        job.move_to_stage(Stage::GenerateTranscript);
        assert_eq!(
            job.completed_stages,
            vec![Stage::Download, Stage::ExtractAudio]
        );
    }

    #[test]
    fn test_failure_preserves_stage_and_message() {
        let mut job = test_job();
        job.start();
        job.move_to_stage(Stage::GenerateTranscript);
        job.update_status(JobStatus::Failed, Some("transcription backend unreachable"));

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.current_stage, Some(Stage::GenerateTranscript));
        assert_eq!(
            job.error_message.as_deref(),
            Some("transcription backend unreachable")
        );
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_update_status_without_error_keeps_message_clear() {
        let mut job = test_job();
        job.update_status(JobStatus::Completed, None);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_record_output() {
        let mut job = test_job();
        job.record_output(OutputKind::Transcript, "outputs/job/transcript.txt");
        assert_eq!(
            job.output_files.get(&OutputKind::Transcript).map(String::as_str),
            Some("outputs/job/transcript.txt")
        );
    }
}
