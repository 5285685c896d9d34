//! Probed and AI-generated video metadata.

use serde::{Deserialize, Serialize};

/// Technical metadata probed from the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration_secs: f64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Container format name (e.g. "mov,mp4,m4a,3gp,3g2,mj2")
    pub format: String,
}

impl VideoMetadata {
    /// Resolution as a `WxH` display string.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// A chapter marker within the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter title
    pub title: String,
    /// Start offset in seconds
    pub start_secs: f64,
}

/// AI-generated descriptive metadata for publication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedMetadata {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub show_notes: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl GeneratedMetadata {
    /// Render chapters as `MM:SS Title` lines for show-notes publication.
    pub fn format_chapters(&self) -> String {
        self.chapters
            .iter()
            .map(|c| {
                let total = c.start_secs.max(0.0) as u64;
                format!("{:02}:{:02} {}", total / 60, total % 60, c.title)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_display() {
        let meta = VideoMetadata {
            duration_secs: 120.0,
            width: 1920,
            height: 1080,
            format: "mp4".into(),
        };
        assert_eq!(meta.resolution(), "1920x1080");
    }

    #[test]
    fn test_format_chapters() {
        let meta = GeneratedMetadata {
            chapters: vec![
                Chapter {
                    title: "Intro".into(),
                    start_secs: 0.0,
                },
                Chapter {
                    title: "Main topic".into(),
                    start_secs: 95.0,
                },
            ],
            ..Default::default()
        };
        assert_eq!(meta.format_chapters(), "00:00 Intro\n01:35 Main topic");
    }
}
