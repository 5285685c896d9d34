//! Pipeline stage definitions and output catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ordered step of the video processing pipeline.
///
/// Stages are totally ordered; the orchestrator never skips or reorders
/// them. `Publish` is conditionally omitted when publishing is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetch the source video into the job workspace
    Download,
    /// Extract the audio track for transcription
    ExtractAudio,
    /// Generate the transcript from the audio
    GenerateTranscript,
    /// Format transcript segments as VTT/SRT subtitles
    GenerateSubtitles,
    /// Generate title/description/tags/show-notes/chapters
    GenerateMetadata,
    /// Grab a thumbnail frame
    GenerateThumbnail,
    /// Upload derived artifacts to storage
    UploadOutputs,
    /// Publish the video to the external platform (optional)
    Publish,
    /// Finalize the job record
    Complete,
}

impl Stage {
    /// All stages in canonical order.
    pub const ALL: [Stage; 9] = [
        Stage::Download,
        Stage::ExtractAudio,
        Stage::GenerateTranscript,
        Stage::GenerateSubtitles,
        Stage::GenerateMetadata,
        Stage::GenerateThumbnail,
        Stage::UploadOutputs,
        Stage::Publish,
        Stage::Complete,
    ];

    /// The stage sequence actually run for a job, with or without `Publish`.
    pub fn sequence(publish_enabled: bool) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| publish_enabled || *s != Stage::Publish)
            .collect()
    }

    /// The stage following this one in canonical order, if any.
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::ALL.iter().position(|s| s == self)?;
        Stage::ALL.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::ExtractAudio => "extract_audio",
            Stage::GenerateTranscript => "generate_transcript",
            Stage::GenerateSubtitles => "generate_subtitles",
            Stage::GenerateMetadata => "generate_metadata",
            Stage::GenerateThumbnail => "generate_thumbnail",
            Stage::UploadOutputs => "upload_outputs",
            Stage::Publish => "publish",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logical name for a derived pipeline output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Transcript,
    SubtitlesVtt,
    SubtitlesSrt,
    Thumbnail,
    ShowNotes,
    Chapters,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Transcript => "transcript",
            OutputKind::SubtitlesVtt => "subtitles_vtt",
            OutputKind::SubtitlesSrt => "subtitles_srt",
            OutputKind::Thumbnail => "thumbnail",
            OutputKind::ShowNotes => "shownotes",
            OutputKind::Chapters => "chapters",
        }
    }

    /// Suggested filename for this output within a job's output prefix.
    pub fn filename(&self) -> &'static str {
        match self {
            OutputKind::Transcript => "transcript.txt",
            OutputKind::SubtitlesVtt => "subtitles.vtt",
            OutputKind::SubtitlesSrt => "subtitles.srt",
            OutputKind::Thumbnail => "thumbnail.jpg",
            OutputKind::ShowNotes => "shownotes.md",
            OutputKind::Chapters => "chapters.txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputKind::Transcript | OutputKind::Chapters => "text/plain",
            OutputKind::SubtitlesVtt => "text/vtt",
            OutputKind::SubtitlesSrt => "application/x-subrip",
            OutputKind::Thumbnail => "image/jpeg",
            OutputKind::ShowNotes => "text/markdown",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_is_monotonic() {
        for pair in Stage::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_next_follows_canonical_order() {
        assert_eq!(Stage::Download.next(), Some(Stage::ExtractAudio));
        assert_eq!(Stage::UploadOutputs.next(), Some(Stage::Publish));
        assert_eq!(Stage::Complete.next(), None);
    }

    #[test]
    fn test_sequence_omits_publish_when_disabled() {
        let seq = Stage::sequence(false);
        assert!(!seq.contains(&Stage::Publish));
        assert_eq!(seq.len(), Stage::ALL.len() - 1);

        let seq = Stage::sequence(true);
        assert_eq!(seq, Stage::ALL.to_vec());
    }
}
