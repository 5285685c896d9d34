//! FFmpeg/ffprobe invocation.
//!
//! Codec work is treated as an opaque command: build arguments, run the
//! tool with a timeout, surface stderr on non-zero exit. Nothing here
//! inspects media bytes itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use vodpipe_models::VideoMetadata;

use crate::error::{MediaError, MediaResult};

/// Default per-invocation timeout.
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// Located ffmpeg/ffprobe binaries plus invocation settings.
#[derive(Debug, Clone)]
pub struct MediaToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl MediaToolkit {
    /// Locate ffmpeg and ffprobe on PATH.
    pub fn discover() -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg")
            .map_err(|_| MediaError::ToolMissing("ffmpeg".to_string()))?;
        let ffprobe = which::which("ffprobe")
            .map_err(|_| MediaError::ToolMissing("ffprobe".to_string()))?;
        Ok(Self {
            ffmpeg,
            ffprobe,
            timeout: DEFAULT_TOOL_TIMEOUT,
        })
    }

    /// Build a toolkit from known binary paths.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract the audio track as 16 kHz mono WAV for transcription.
    pub async fn extract_audio(&self, video: &Path, out_dir: &Path) -> MediaResult<PathBuf> {
        let output = out_dir.join("audio.wav");
        let args = [
            "-y",
            "-loglevel",
            "error",
            "-i",
            &video.display().to_string(),
            "-vn",
            "-ac",
            "1",
            "-ar",
            "16000",
            "-f",
            "wav",
            &output.display().to_string(),
        ];
        self.run(&self.ffmpeg, "ffmpeg", &args).await?;
        Ok(output)
    }

    /// Grab a single frame at the given offset as a JPEG thumbnail.
    pub async fn extract_frame(
        &self,
        video: &Path,
        timestamp_secs: f64,
        out_dir: &Path,
    ) -> MediaResult<PathBuf> {
        let output = out_dir.join("thumbnail.jpg");
        let args = [
            "-y",
            "-loglevel",
            "error",
            "-ss",
            &format!("{:.3}", timestamp_secs.max(0.0)),
            "-i",
            &video.display().to_string(),
            "-vframes",
            "1",
            "-q:v",
            "2",
            &output.display().to_string(),
        ];
        self.run(&self.ffmpeg, "ffmpeg", &args).await?;
        Ok(output)
    }

    /// Probe duration, resolution and container format.
    pub async fn probe(&self, video: &Path) -> MediaResult<VideoMetadata> {
        let args = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            &video.display().to_string(),
        ];
        let stdout = self.run(&self.ffprobe, "ffprobe", &args).await?;
        parse_probe_output(&stdout)
    }

    async fn run(&self, tool: &Path, name: &str, args: &[&str]) -> MediaResult<String> {
        debug!("Running {} {}", name, args.join(" "));

        let child = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MediaError::Timeout {
                    tool: name.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(MediaError::CommandFailed {
                tool: name.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_probe_output(json: &str) -> MediaResult<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let duration_secs = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::InvalidOutput("missing format.duration".to_string()))?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(VideoMetadata {
        duration_secs,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        format: probe.format.format_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "125.440000"},
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080}
            ]
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.duration_secs, 125.44);
        assert_eq!(meta.resolution(), "1920x1080");
        assert_eq!(meta.format, "mov,mp4,m4a,3gp,3g2,mj2");
    }

    #[test]
    fn test_parse_probe_output_missing_duration() {
        let json = r#"{"format": {"format_name": "mp4"}, "streams": []}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidOutput(_))
        ));
    }
}
