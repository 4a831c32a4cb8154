//! Shared fixtures for the worker integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use framex_media::{FrameExtractor, MediaError, MediaResult};
use framex_models::{encode, ProcessingRequest, VideoId};
use framex_queue::{Broker, CacheStore, MemoryBroker, MemoryCache, ProjectorConfig, QueueStatusProjector};
use framex_storage::MemoryStore;
use framex_worker::{ConsumerLoop, ExtractionPipeline, FrameProcessor};
use tempfile::TempDir;

pub const INTAKE: &str = "video_processing";
pub const RESULTS: &str = "video_processed";
pub const NOTIFICATIONS: &str = "notifications";
pub const DEAD_LETTER: &str = "video_processing.dead";
pub const UPLOADS: &str = "video-uploads";
pub const PROCESSED: &str = "video-processed";

/// What the fake extractor does with the next input.
#[derive(Debug, Clone, Copy)]
pub enum ExtractBehavior {
    Frames(usize),
    Fail,
    TimeOut,
}

/// Writes placeholder PNG frames instead of running FFmpeg.
pub struct FakeExtractor {
    behavior: ExtractBehavior,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(behavior: ExtractBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn extract(&self, input: &Path, output_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "source must be downloaded before extraction");

        match self.behavior {
            ExtractBehavior::Fail => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with status 1",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            )),
            ExtractBehavior::TimeOut => Err(MediaError::Timeout(600)),
            ExtractBehavior::Frames(count) => {
                let mut frames = Vec::with_capacity(count);
                // Written in reverse to check that packaging sorts entries
                for i in (1..=count).rev() {
                    let path = output_dir.join(format!("frame_{:04}.png", i));
                    tokio::fs::write(&path, format!("png-{}", i)).await?;
                    frames.push(path);
                }
                frames.sort();
                Ok(frames)
            }
        }
    }
}

pub fn request(id: &str) -> ProcessingRequest {
    ProcessingRequest {
        video_id: VideoId::from(id),
        filename: format!("{}.mp4", id),
        bucket: UPLOADS.to_string(),
        object_name: format!("{}/{}.mp4", id, id),
        user_id: "u1".to_string(),
    }
}

/// Processing side of the pipeline over in-memory infrastructure.
pub struct Harness {
    pub broker: MemoryBroker,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub extractor: Arc<FakeExtractor>,
    pub projector: Arc<QueueStatusProjector>,
    pub work_dir: TempDir,
}

impl Harness {
    pub async fn new(behavior: ExtractBehavior) -> Self {
        let broker = MemoryBroker::new();
        for queue in [INTAKE, RESULTS, NOTIFICATIONS] {
            broker.declare(queue).await.unwrap();
        }

        let cache = Arc::new(MemoryCache::new());
        let projector = Arc::new(QueueStatusProjector::new(
            Arc::new(broker.clone()),
            Some(cache.clone() as Arc<dyn CacheStore>),
            INTAKE,
            ProjectorConfig::default(),
        ));

        Self {
            broker,
            store: Arc::new(MemoryStore::new()),
            cache,
            extractor: Arc::new(FakeExtractor::new(behavior)),
            projector,
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Upload a source video and queue its processing request.
    pub async fn submit(&self, id: &str) -> ProcessingRequest {
        let request = request(id);
        self.store
            .insert(&request.bucket, &request.object_name, b"fake video".to_vec())
            .await;
        self.enqueue(&request).await;
        request
    }

    pub async fn enqueue(&self, request: &ProcessingRequest) {
        self.broker
            .publish(INTAKE, &encode(request).unwrap())
            .await
            .unwrap();
    }

    pub fn processor(&self) -> Arc<FrameProcessor> {
        let pipeline = ExtractionPipeline::new(
            self.store.clone(),
            self.extractor.clone(),
            PROCESSED,
            self.work_dir.path(),
        );
        Arc::new(FrameProcessor::new(
            pipeline,
            Arc::new(self.broker.clone()),
            RESULTS,
            self.projector.clone(),
        ))
    }

    pub fn intake_consumer(&self) -> ConsumerLoop {
        ConsumerLoop::new(Arc::new(self.broker.clone()), INTAKE, "test-worker", self.processor())
    }

    /// Entries left in the work directory; job directories must be gone.
    pub fn work_dir_entries(&self) -> usize {
        std::fs::read_dir(self.work_dir.path()).unwrap().count()
    }
}
