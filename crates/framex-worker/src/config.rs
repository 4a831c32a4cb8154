//! Worker configuration.

use std::time::Duration;

use framex_storage::DEFAULT_PROCESSED_BUCKET;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for job-scoped temporary directories
    pub work_dir: String,
    /// Frames extracted per second of video
    pub frame_rate: u32,
    /// Hard limit on one FFmpeg run; zero disables it
    pub extraction_timeout_secs: u64,
    /// Bucket receiving frame archives
    pub processed_bucket: String,
    /// Consumer tag announced to the broker
    pub consumer_name: String,
    /// Pause after a failed broker read before trying again
    pub error_backoff: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("framex").to_string_lossy().into_owned(),
            frame_rate: 1,
            extraction_timeout_secs: 600,
            processed_bucket: DEFAULT_PROCESSED_BUCKET.to_string(),
            consumer_name: format!("framex-{}", uuid::Uuid::new_v4()),
            error_backoff: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            frame_rate: std::env::var("WORKER_FRAME_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&rate: &u32| rate > 0)
                .unwrap_or(defaults.frame_rate),
            extraction_timeout_secs: std::env::var("WORKER_EXTRACTION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.extraction_timeout_secs),
            processed_bucket: std::env::var("PROCESSED_BUCKET").unwrap_or(defaults.processed_bucket),
            consumer_name: std::env::var("WORKER_CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            error_backoff: Duration::from_secs(
                std::env::var("WORKER_ERROR_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}
