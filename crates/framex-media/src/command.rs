//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Number of stderr log lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    /// Output file path or pattern
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Overwrite, errors-only logging, progress on stderr, then input and outputs.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "error", "-progress", "pipe:2", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs FFmpeg with progress tracking and an optional hard timeout.
#[derive(Debug, Default)]
pub struct FfmpegRunner {
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a hard timeout. The child is killed when it expires.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command, feeding parsed progress to `progress_callback`.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress lines feed the callback, everything else is kept as the error tail
        let stderr_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            Vec::from(tail).join("\n")
        });

        let outcome = wait_with_timeout(&mut child, self.timeout_secs).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        match outcome? {
            Some(code) if code != 0 => Err(MediaError::ffmpeg_failed(
                last_line_or(&stderr_tail, "FFmpeg exited with non-zero status"),
                Some(stderr_tail),
                Some(code),
            )),
            None => Err(MediaError::ffmpeg_failed(
                "FFmpeg terminated by signal",
                Some(stderr_tail),
                None,
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Wait for `child`, killing it once `timeout_secs` have passed; returns its exit code.
async fn wait_with_timeout(child: &mut Child, timeout_secs: Option<u64>) -> MediaResult<Option<i32>> {
    let Some(secs) = timeout_secs else {
        return Ok(child.wait().await?.code());
    };

    let waited = tokio::time::timeout(Duration::from_secs(secs), child.wait()).await;
    match waited {
        Ok(status) => Ok(status?.code()),
        Err(_) => {
            warn!("FFmpeg timed out after {} seconds, killing process", secs);
            let _ = child.kill().await;
            Err(MediaError::Timeout(secs))
        }
    }
}

fn last_line_or(text: &str, fallback: &str) -> String {
    text.lines()
        .last()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
