//! Video catalog.
//!
//! The storage service keeps one entry per video. Entries are upserted from
//! processing results, so replays of the same result converge on one record.

use std::collections::HashMap;

use async_trait::async_trait;
use framex_models::{UserStats, VideoId, VideoRecord};
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get(&self, video_id: &VideoId) -> Option<VideoRecord>;

    /// Insert or replace the entry for `record.video_id`. Last write wins.
    async fn put(&self, record: VideoRecord);

    /// Remove an entry owned by `owner`.
    async fn delete(&self, video_id: &VideoId, owner: &str) -> StorageResult<VideoRecord>;

    /// Entries of one owner, most recently processed first.
    async fn list_by_owner(&self, owner: &str) -> Vec<VideoRecord>;

    async fn stats(&self, owner: &str) -> UserStats;
}

/// Process-wide catalog behind a single read/write lock.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<HashMap<VideoId, VideoRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get(&self, video_id: &VideoId) -> Option<VideoRecord> {
        self.records.read().await.get(video_id).cloned()
    }

    async fn put(&self, record: VideoRecord) {
        self.records
            .write()
            .await
            .insert(record.video_id.clone(), record);
    }

    async fn delete(&self, video_id: &VideoId, owner: &str) -> StorageResult<VideoRecord> {
        let mut records = self.records.write().await;
        match records.get(video_id) {
            None => Err(StorageError::not_found(video_id.as_str())),
            Some(record) if record.user_id != owner => Err(StorageError::forbidden(video_id.as_str())),
            Some(_) => records
                .remove(video_id)
                .ok_or_else(|| StorageError::not_found(video_id.as_str())),
        }
    }

    async fn list_by_owner(&self, owner: &str) -> Vec<VideoRecord> {
        let mut owned: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.processed_at
                .cmp(&a.processed_at)
                .then_with(|| a.video_id.cmp(&b.video_id))
        });
        owned
    }

    async fn stats(&self, owner: &str) -> UserStats {
        let records = self.records.read().await;
        UserStats::from_records(records.values().filter(|r| r.user_id == owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use framex_models::JobStatus;

    fn record(id: &str, owner: &str, status: JobStatus, age_secs: i64) -> VideoRecord {
        VideoRecord {
            video_id: VideoId::from(id),
            title: format!("{id}.mp4"),
            status,
            processed_at: Utc::now() - Duration::seconds(age_secs),
            frame_count: 3,
            zip_size: 300,
            zip_object_name: format!("frames_{id}.zip"),
            user_id: owner.to_string(),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let catalog = MemoryCatalog::new();
        catalog.put(record("v1", "u1", JobStatus::Error, 10)).await;
        catalog.put(record("v1", "u1", JobStatus::Completed, 0)).await;

        assert_eq!(catalog.len().await, 1);
        let stored = catalog.get(&VideoId::from("v1")).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_ordered() {
        let catalog = MemoryCatalog::new();
        catalog.put(record("old", "u1", JobStatus::Completed, 100)).await;
        catalog.put(record("new", "u1", JobStatus::Completed, 1)).await;
        catalog.put(record("other", "u2", JobStatus::Completed, 1)).await;

        let ids: Vec<_> = catalog
            .list_by_owner("u1")
            .await
            .into_iter()
            .map(|r| r.video_id.0)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_delete_checks_owner() {
        let catalog = MemoryCatalog::new();
        catalog.put(record("v1", "u1", JobStatus::Completed, 0)).await;

        let err = catalog.delete(&VideoId::from("v1"), "u2").await.unwrap_err();
        assert!(matches!(err, StorageError::Forbidden(_)));

        let err = catalog.delete(&VideoId::from("nope"), "u1").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        catalog.delete(&VideoId::from("v1"), "u1").await.unwrap();
        assert!(catalog.is_empty().await);
    }

    #[tokio::test]
    async fn test_stats() {
        let catalog = MemoryCatalog::new();
        catalog.put(record("a", "u1", JobStatus::Completed, 0)).await;
        catalog.put(record("b", "u1", JobStatus::Error, 0)).await;
        catalog.put(record("c", "u2", JobStatus::Completed, 0)).await;

        let stats = catalog.stats("u1").await;
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_frames, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_every_entry_intact() {
        let catalog = std::sync::Arc::new(MemoryCatalog::new());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let catalog = catalog.clone();
                tokio::spawn(async move {
                    let mut entry = record(&format!("v{i}"), &format!("u{}", i % 4), JobStatus::Completed, 0);
                    entry.frame_count = i;
                    entry.zip_size = u64::from(i) * 100;
                    catalog.put(entry).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(catalog.len().await, 32);
        for i in 0..32u32 {
            let stored = catalog.get(&VideoId::from(format!("v{i}"))).await.unwrap();
            assert_eq!(stored.frame_count, i);
            assert_eq!(stored.zip_size, u64::from(i) * 100);
            assert_eq!(stored.zip_object_name, format!("frames_v{i}.zip"));
            assert_eq!(stored.user_id, format!("u{}", i % 4));
        }
    }
}
