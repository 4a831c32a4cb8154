//! Queue projections served by the status API and cached between calls.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// Cache key of the [`QueueStatus`] projection.
pub const STATUS_CACHE_KEY: &str = "queue:status";
/// Cache key prefix of per-video [`QueuePosition`] projections.
pub const POSITION_CACHE_PREFIX: &str = "queue:position:";
/// Default TTL of the status projection.
pub const STATUS_TTL_SECS: u64 = 10;
/// Default TTL of a position projection.
pub const POSITION_TTL_SECS: u64 = 30;

/// Cache key of the position projection for a video.
pub fn position_cache_key(video_id: &VideoId) -> String {
    format!("{}{}", POSITION_CACHE_PREFIX, video_id)
}

/// Depth of the intake queue and the estimated number of jobs in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueStatus {
    pub queue_length: u64,
    pub processing_count: u64,
}

impl QueueStatus {
    /// Project the status from an observed intake depth.
    pub fn from_depth(depth: u64, max_workers: u64) -> Self {
        Self {
            queue_length: depth,
            processing_count: depth.min(max_workers),
        }
    }
}

/// Rough position of a video in the intake queue.
///
/// This is an estimate derived from the queue depth only; the broker does not
/// expose the real offset of a given message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueuePosition {
    pub position: u64,
    pub estimated_wait_seconds: u64,
}

impl QueuePosition {
    /// Project a position from an observed intake depth.
    pub fn from_depth(depth: u64, average_job_seconds: u64) -> Self {
        let position = if depth <= 1 { 1 } else { depth / 2 };
        Self {
            position,
            estimated_wait_seconds: position.saturating_mul(average_job_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_count_is_capped() {
        assert_eq!(QueueStatus::from_depth(0, 5).processing_count, 0);
        assert_eq!(QueueStatus::from_depth(3, 5).processing_count, 3);
        let status = QueueStatus::from_depth(12, 5);
        assert_eq!(status.queue_length, 12);
        assert_eq!(status.processing_count, 5);
    }

    #[test]
    fn test_position_formula() {
        assert_eq!(QueuePosition::from_depth(0, 90).position, 1);
        assert_eq!(QueuePosition::from_depth(1, 90).position, 1);
        assert_eq!(QueuePosition::from_depth(2, 90).position, 1);
        let p = QueuePosition::from_depth(10, 90);
        assert_eq!(p.position, 5);
        assert_eq!(p.estimated_wait_seconds, 450);
        assert_eq!(QueuePosition::from_depth(7, 90).position, 3);
    }

    #[test]
    fn test_position_key() {
        assert_eq!(position_cache_key(&VideoId::from("abc")), "queue:position:abc");
    }
}
