//! Queue status projector.
//!
//! Answers "how busy is the pipeline" and "where is my video" from the depth
//! of the intake queue, with a read-through cache in front. The cache is best
//! effort: every call is bounded by a short timeout and any failure falls back
//! to a live computation.

use std::future::Future;
use std::sync::Arc;

use framex_models::{
    position_cache_key, QueuePosition, QueueStatus, VideoId, POSITION_CACHE_PREFIX,
    STATUS_CACHE_KEY,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::cache::CacheStore;
use crate::config::ProjectorConfig;
use crate::error::{QueueError, QueueResult};

/// Read-side projection of the intake queue.
#[derive(Clone)]
pub struct QueueStatusProjector {
    broker: Arc<dyn Broker>,
    cache: Option<Arc<dyn CacheStore>>,
    intake_queue: String,
    config: ProjectorConfig,
}

impl QueueStatusProjector {
    pub fn new(
        broker: Arc<dyn Broker>,
        cache: Option<Arc<dyn CacheStore>>,
        intake_queue: impl Into<String>,
        config: ProjectorConfig,
    ) -> Self {
        Self {
            broker,
            cache,
            intake_queue: intake_queue.into(),
            config,
        }
    }

    pub fn intake_queue(&self) -> &str {
        &self.intake_queue
    }

    /// Current queue length and estimated jobs in flight.
    pub async fn queue_status(&self) -> QueueResult<QueueStatus> {
        if let Some(cached) = self.cached::<QueueStatus>(STATUS_CACHE_KEY).await {
            return Ok(cached);
        }

        let depth = self.broker.depth(&self.intake_queue).await?;
        let status = QueueStatus::from_depth(depth, self.config.max_workers);
        self.store(STATUS_CACHE_KEY, &status, self.config.status_ttl_secs)
            .await;
        Ok(status)
    }

    /// Estimated position and wait of one video.
    pub async fn position(&self, video_id: &VideoId) -> QueueResult<QueuePosition> {
        let key = position_cache_key(video_id);
        if let Some(cached) = self.cached::<QueuePosition>(&key).await {
            return Ok(cached);
        }

        let depth = self.broker.depth(&self.intake_queue).await?;
        let position = QueuePosition::from_depth(depth, self.config.average_job_seconds);
        self.store(&key, &position, self.config.position_ttl_secs)
            .await;
        Ok(position)
    }

    /// Drop the status projection and every position projection.
    ///
    /// Never fails; cache errors are logged and swallowed.
    pub async fn invalidate(&self) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = self.bounded(cache.del(STATUS_CACHE_KEY)).await {
            warn!(error = %e, "Failed to invalidate queue status cache");
        }
        match self.bounded(cache.del_prefix(POSITION_CACHE_PREFIX)).await {
            Ok(removed) => debug!(removed, "Invalidated queue position cache"),
            Err(e) => warn!(error = %e, "Failed to invalidate queue position cache"),
        }
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match self.bounded(cache.get(key)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, computing live");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(cache) = &self.cache else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode projection");
                return;
            }
        };
        if let Err(e) = self.bounded(cache.set_ex(key, &raw, ttl_secs)).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = QueueResult<T>>) -> QueueResult<T> {
        tokio::time::timeout(self.config.cache_timeout, call)
            .await
            .map_err(|_| QueueError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::memory::MemoryBroker;
    use std::time::Duration;

    const INTAKE: &str = "video_processing";

    async fn setup(depth: usize) -> (MemoryBroker, Arc<MemoryCache>, QueueStatusProjector) {
        let broker = MemoryBroker::new();
        for i in 0..depth {
            broker.publish(INTAKE, format!("job-{i}").as_bytes()).await.unwrap();
        }
        let cache = Arc::new(MemoryCache::new());
        let projector = QueueStatusProjector::new(
            Arc::new(broker.clone()),
            Some(cache.clone() as Arc<dyn CacheStore>),
            INTAKE,
            ProjectorConfig::default(),
        );
        (broker, cache, projector)
    }

    #[tokio::test]
    async fn test_status_is_cached() {
        let (broker, cache, projector) = setup(12).await;

        let status = projector.queue_status().await.unwrap();
        assert_eq!(status, QueueStatus { queue_length: 12, processing_count: 5 });
        assert!(cache.keys().await.contains(&STATUS_CACHE_KEY.to_string()));

        // Depth changes are not visible until the entry expires or is invalidated
        broker.drain(INTAKE).await;
        assert_eq!(projector.queue_status().await.unwrap().queue_length, 12);

        projector.invalidate().await;
        assert_eq!(projector.queue_status().await.unwrap().queue_length, 0);
    }

    #[tokio::test]
    async fn test_position_projection() {
        let (_broker, cache, projector) = setup(10).await;
        let position = projector.position(&VideoId::from("v1")).await.unwrap();
        assert_eq!(position.position, 5);
        assert_eq!(position.estimated_wait_seconds, 450);
        assert!(cache.keys().await.contains(&"queue:position:v1".to_string()));
    }

    #[tokio::test]
    async fn test_position_for_short_queue() {
        let (_broker, _cache, projector) = setup(1).await;
        let position = projector.position(&VideoId::from("v1")).await.unwrap();
        assert_eq!(position, QueuePosition { position: 1, estimated_wait_seconds: 90 });
    }

    #[tokio::test]
    async fn test_invalidate_clears_all_projections() {
        let (_broker, cache, projector) = setup(4).await;
        projector.queue_status().await.unwrap();
        projector.position(&VideoId::from("a")).await.unwrap();
        projector.position(&VideoId::from("b")).await.unwrap();
        assert_eq!(cache.keys().await.len(), 3);

        projector.invalidate().await;
        assert!(cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_cache_falls_back_to_live() {
        let (_broker, cache, projector) = setup(3).await;
        cache.set_unavailable(true);

        let status = projector.queue_status().await.unwrap();
        assert_eq!(status, QueueStatus { queue_length: 3, processing_count: 3 });
        projector.invalidate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cache_is_bounded() {
        let (_broker, cache, projector) = setup(2).await;
        cache.set_delay(Some(Duration::from_secs(30))).await;

        let started = tokio::time::Instant::now();
        let status = projector.queue_status().await.unwrap();
        assert_eq!(status.queue_length, 2);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_without_cache() {
        let broker = MemoryBroker::new();
        broker.publish(INTAKE, b"x").await.unwrap();
        let projector =
            QueueStatusProjector::new(Arc::new(broker), None, INTAKE, ProjectorConfig::default());
        assert_eq!(projector.queue_status().await.unwrap().queue_length, 1);
        projector.invalidate().await;
    }
}
