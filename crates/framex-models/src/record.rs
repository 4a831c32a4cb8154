//! Catalog records kept by the storage service.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::envelope::ProcessingResult;
use crate::status::JobStatus;
use crate::video::VideoId;

/// Title used when a result carries no original file name.
pub const UNTITLED_VIDEO: &str = "Untitled video";

/// Catalog entry for one video, keyed by `video_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub title: String,
    pub status: JobStatus,
    pub processed_at: DateTime<Utc>,
    pub frame_count: u32,
    pub zip_size: u64,
    pub zip_object_name: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoRecord {
    pub fn from_result(result: &ProcessingResult) -> Self {
        Self {
            video_id: result.video_id.clone(),
            title: result
                .original_filename()
                .unwrap_or(UNTITLED_VIDEO)
                .to_string(),
            status: result.status,
            processed_at: result.processed_at,
            frame_count: result.frame_count,
            zip_size: result.zip_size,
            zip_object_name: result.zip_object_name.clone(),
            user_id: result.user_id.clone(),
            error: result.error.clone(),
        }
    }

    pub fn is_downloadable(&self) -> bool {
        self.status == JobStatus::Completed && !self.zip_object_name.is_empty()
    }
}

/// Aggregate counts over one user's catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserStats {
    pub total_videos: u64,
    pub completed: u64,
    pub processing: u64,
    pub failed: u64,
    /// Sum of archive sizes over completed videos
    pub total_size: u64,
    /// Sum of frame counts over completed videos
    pub total_frames: u64,
}

impl UserStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a VideoRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total_videos += 1;
            match record.status {
                JobStatus::Completed => {
                    stats.completed += 1;
                    stats.total_size += record.zip_size;
                    stats.total_frames += u64::from(record.frame_count);
                }
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Error => stats.failed += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ProcessingRequest;

    fn request(id: &str, filename: &str) -> ProcessingRequest {
        ProcessingRequest {
            video_id: VideoId::from(id),
            filename: filename.to_string(),
            bucket: "raw".to_string(),
            object_name: format!("{id}/{filename}"),
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_title_from_metadata() {
        let result = ProcessingResult::completed(&request("v1", "beach.mov"), 4, 99, "frames_v1.zip");
        let record = VideoRecord::from_result(&result);
        assert_eq!(record.title, "beach.mov");
        assert!(record.is_downloadable());
    }

    #[test]
    fn test_title_defaults_when_missing() {
        let mut result = ProcessingResult::completed(&request("v1", ""), 4, 99, "frames_v1.zip");
        result.metadata.clear();
        assert_eq!(VideoRecord::from_result(&result).title, UNTITLED_VIDEO);
    }

    #[test]
    fn test_stats_only_sum_completed() {
        let ok = VideoRecord::from_result(&ProcessingResult::completed(
            &request("v1", "a.mp4"),
            10,
            1000,
            "frames_v1.zip",
        ));
        let failed = VideoRecord::from_result(&ProcessingResult::failed(
            &request("v2", "b.mp4"),
            "download",
            "download failed: gone",
        ));
        let stats = UserStats::from_records([&ok, &failed]);
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_size, 1000);
        assert_eq!(stats.total_frames, 10);
        assert!(!failed.is_downloadable());
    }
}
