//! FFmpeg CLI wrapper for frame extraction.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - A hard timeout that kills a stuck FFmpeg process
//! - Frame extraction behind the [`FrameExtractor`] trait
//! - Deflate zip packaging of extracted frames

pub mod archive;
pub mod command;
pub mod error;
pub mod frames;
pub mod progress;

pub use archive::package_frames;
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{collect_frames, FfmpegFrameExtractor, FrameExtractor, FRAME_PATTERN};
pub use progress::FfmpegProgress;
