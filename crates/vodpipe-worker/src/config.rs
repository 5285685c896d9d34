//! Worker configuration.

use std::time::Duration;

use vodpipe_storage::RetryConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for per-job temporary workspaces
    pub work_dir: String,
    /// Key prefix derived outputs are uploaded under
    pub output_prefix: String,
    /// Whether the publish stage runs at all
    pub publish_enabled: bool,
    /// Offset into the video for the thumbnail frame (clamped to duration)
    pub thumbnail_timestamp_secs: f64,
    /// Attempts per storage operation
    pub storage_retry_attempts: u32,
    /// Base backoff delay for storage retries
    pub storage_retry_base: Duration,
    /// Backoff cap for storage retries
    pub storage_retry_max: Duration,
    /// Timeout applied to each external call (never the whole pipeline)
    pub call_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: "/tmp/vodpipe".to_string(),
            output_prefix: "outputs".to_string(),
            publish_enabled: false,
            thumbnail_timestamp_secs: 1.0,
            storage_retry_attempts: 3,
            storage_retry_base: Duration::from_millis(500),
            storage_retry_max: Duration::from_secs(10),
            call_timeout: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("VODPIPE_WORK_DIR").unwrap_or(defaults.work_dir),
            output_prefix: std::env::var("VODPIPE_OUTPUT_PREFIX").unwrap_or(defaults.output_prefix),
            publish_enabled: std::env::var("VODPIPE_PUBLISH_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.publish_enabled),
            thumbnail_timestamp_secs: std::env::var("VODPIPE_THUMBNAIL_TS_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.thumbnail_timestamp_secs),
            storage_retry_attempts: std::env::var("VODPIPE_STORAGE_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.storage_retry_attempts),
            storage_retry_base: Duration::from_millis(
                std::env::var("VODPIPE_STORAGE_RETRY_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.storage_retry_base.as_millis() as u64),
            ),
            storage_retry_max: Duration::from_millis(
                std::env::var("VODPIPE_STORAGE_RETRY_MAX_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.storage_retry_max.as_millis() as u64),
            ),
            call_timeout: Duration::from_secs(
                std::env::var("VODPIPE_CALL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.call_timeout.as_secs()),
            ),
        }
    }

    /// The retry policy storage operations run under.
    pub fn storage_retry(&self) -> RetryConfig {
        RetryConfig::new("storage")
            .with_max_attempts(self.storage_retry_attempts)
            .with_base_delay(self.storage_retry_base)
            .with_max_delay(self.storage_retry_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert!(!config.publish_enabled);
        assert_eq!(config.output_prefix, "outputs");
        assert_eq!(config.storage_retry_attempts, 3);
    }
}
