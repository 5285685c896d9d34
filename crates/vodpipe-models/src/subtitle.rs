//! Transcript segments and subtitle formatting.
//!
//! Downstream consumers (players, the publish target) require the VTT and
//! SRT text formats verbatim, so the formatters here are exact about
//! headers, separators and trailing newlines.

use serde::{Deserialize, Serialize};

/// One timed span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Spoken text
    pub text: String,
    /// Start offset in seconds
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Join segment texts into a plain transcript.
pub fn plain_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format segments as WebVTT.
///
/// Output shape: `WEBVTT` header, blank line, then per segment a
/// `HH:MM:SS.mmm --> HH:MM:SS.mmm` cue line, the text, and a blank
/// separator line (omitted after the final cue).
pub fn format_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for (i, seg) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{} --> {}\n{}\n",
            vtt_timestamp(seg.start),
            vtt_timestamp(seg.end),
            seg.text
        ));
        if i + 1 < segments.len() {
            out.push('\n');
        }
    }
    out
}

/// Format segments as SubRip (SRT).
///
/// Cues are 1-indexed and timestamps use a comma before the milliseconds.
pub fn format_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n",
            i + 1,
            srt_timestamp(seg.start),
            srt_timestamp(seg.end),
            seg.text
        ));
        if i + 1 < segments.len() {
            out.push('\n');
        }
    }
    out
}

/// Render seconds as `HH:MM:SS.mmm`.
fn vtt_timestamp(secs: f64) -> String {
    timestamp(secs, '.')
}

/// Render seconds as `HH:MM:SS,mmm`.
fn srt_timestamp(secs: f64) -> String {
    timestamp(secs, ',')
}

fn timestamp(secs: f64, millis_sep: char) -> String {
    let secs = secs.max(0.0);
    let total_millis = (secs * 1000.0).round() as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    let (h, m, s) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);
    format!("{:02}:{:02}:{:02}{}{:03}", h, m, s, millis_sep, millis)
}
