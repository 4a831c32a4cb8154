//! Frame extraction.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// File name prefix of extracted frames.
pub const FRAME_PREFIX: &str = "frame_";
/// File extension of extracted frames.
pub const FRAME_EXTENSION: &str = "png";
/// Output pattern handed to FFmpeg.
pub const FRAME_PATTERN: &str = "frame_%04d.png";

/// Turns a video file into a directory of still frames.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract frames of `input` into `output_dir`, returning them sorted by file name.
    ///
    /// An empty result is not an error here; callers decide what zero frames means.
    async fn extract(&self, input: &Path, output_dir: &Path) -> MediaResult<Vec<PathBuf>>;
}

/// Frame extractor backed by the FFmpeg CLI (`-vf fps=<rate>`).
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    frame_rate: u32,
    timeout_secs: Option<u64>,
}

impl FfmpegFrameExtractor {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            timeout_secs: None,
        }
    }

    /// Kill FFmpeg after `secs`. Zero disables the timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = (secs > 0).then_some(secs);
        self
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn command(&self, input: &Path, output_dir: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output_dir.join(FRAME_PATTERN))
            .video_filter(format!("fps={}", self.frame_rate))
    }
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract(&self, input: &Path, output_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        if !fs::try_exists(input).await? {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        fs::create_dir_all(output_dir).await?;

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        runner
            .run_with_progress(&self.command(input, output_dir), |progress| {
                debug!(frame = progress.frame, speed = progress.speed, "Extraction progress");
            })
            .await?;

        let frames = collect_frames(output_dir).await?;
        info!(
            frames = frames.len(),
            fps = self.frame_rate,
            "Extracted frames from {}",
            input.display()
        );
        Ok(frames)
    }
}

/// List the extracted frames in `dir`, sorted by file name.
pub async fn collect_frames(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_frame_file(&path) && entry.file_type().await?.is_file() {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(frames)
}

fn is_frame_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FRAME_PREFIX));
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(FRAME_EXTENSION));
    name_ok && ext_ok
}
