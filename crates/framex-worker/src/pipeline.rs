//! Frame extraction pipeline.
//!
//! Download → extract → package → upload, inside a job-scoped temporary
//! directory that is removed on every exit path. The first failing stage
//! ends the run and names itself in the failure message.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use framex_media::FrameExtractor;
use framex_models::ProcessingRequest;
use framex_storage::{ObjectStore, ZIP_CONTENT_TYPE};
use tempfile::TempDir;
use tracing::debug;

use crate::metrics;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Extract,
    Package,
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Package => "package",
            Stage::Upload => "upload",
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            Stage::Download => "download failed",
            Stage::Extract => "frame extraction failed",
            Stage::Package => "packaging failed",
            Stage::Upload => "upload failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain failure of one job: becomes an error result, never a redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    fn new(stage: Stage, detail: impl fmt::Display) -> Self {
        Self {
            stage,
            message: format!("{}: {}", stage.failure_prefix(), detail),
        }
    }

    fn bare(stage: Stage, message: &str) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub frame_count: u32,
    pub zip_size: u64,
    pub zip_object_name: String,
}

/// Runs the extraction stages for one request.
#[derive(Clone)]
pub struct ExtractionPipeline {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn FrameExtractor>,
    processed_bucket: String,
    work_dir: PathBuf,
}

impl ExtractionPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn FrameExtractor>,
        processed_bucket: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            extractor,
            processed_bucket: processed_bucket.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn processed_bucket(&self) -> &str {
        &self.processed_bucket
    }

    pub async fn run(&self, request: &ProcessingRequest) -> Result<PipelineOutput, StageFailure> {
        let job_dir = self
            .job_dir()
            .await
            .map_err(|e| StageFailure::new(Stage::Download, format!("cannot create job directory: {}", e)))?;

        let source = job_dir.path().join(source_file_name(request));
        let started = Instant::now();
        let bytes = self
            .store
            .download_to(&request.bucket, &request.object_name, &source)
            .await
            .map_err(|e| StageFailure::new(Stage::Download, e))?;
        metrics::record_stage_duration(Stage::Download, started.elapsed().as_secs_f64());
        debug!(video_id = %request.video_id, bytes, "Source downloaded");

        let frames_dir = job_dir.path().join("frames");
        tokio::fs::create_dir_all(&frames_dir)
            .await
            .map_err(|e| StageFailure::new(Stage::Extract, e))?;

        let started = Instant::now();
        let frames = match self.extractor.extract(&source, &frames_dir).await {
            Ok(frames) => frames,
            Err(e) if e.is_timeout() => {
                return Err(StageFailure::bare(Stage::Extract, "frame extraction timed out"))
            }
            Err(e) => return Err(StageFailure::new(Stage::Extract, e)),
        };
        metrics::record_stage_duration(Stage::Extract, started.elapsed().as_secs_f64());

        if frames.is_empty() {
            return Err(StageFailure::bare(Stage::Extract, "no frames extracted"));
        }
        let frame_count = u32::try_from(frames.len()).unwrap_or(u32::MAX);
        debug!(video_id = %request.video_id, frame_count, "Frames extracted");

        let zip_object_name = request.video_id.archive_object_name();
        // The object key embeds the opaque video ID; the local file never does
        let zip_path = job_dir.path().join(LOCAL_ARCHIVE_NAME);
        let zip_size = framex_media::package_frames(&frames, &zip_path)
            .await
            .map_err(|e| StageFailure::new(Stage::Package, e))?;

        let started = Instant::now();
        self.store
            .upload_file(&self.processed_bucket, &zip_object_name, &zip_path, ZIP_CONTENT_TYPE)
            .await
            .map_err(|e| StageFailure::new(Stage::Upload, e))?;
        metrics::record_stage_duration(Stage::Upload, started.elapsed().as_secs_f64());

        Ok(PipelineOutput {
            frame_count,
            zip_size,
            zip_object_name,
        })
    }

    async fn job_dir(&self) -> std::io::Result<TempDir> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        tempfile::Builder::new()
            .prefix("framex-job-")
            .tempdir_in(&self.work_dir)
    }
}

/// File name of the archive inside the job directory.
const LOCAL_ARCHIVE_NAME: &str = "frames.zip";

/// Local name of the downloaded source, keeping the upload's extension.
fn source_file_name(request: &ProcessingRequest) -> String {
    match Path::new(&request.filename).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("source.{}", ext),
        _ => "source".to_string(),
    }
}
