//! In-process object store for tests and local runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::ObjectStore;
use crate::error::{StorageError, StorageResult};

/// Object store keeping every object in memory, keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object.
    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Read an object back.
    pub async fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Make every following upload fail until reset.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        let data = self
            .get(bucket, key)
            .await
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, key)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        _content_type: &str,
    ) -> StorageResult<u64> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("upload rejected by memory store"));
        }
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        self.insert(bucket, key, data).await;
        Ok(size)
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(bucket, key).await.is_some())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.exists(bucket, key).await? {
            return Err(StorageError::not_found(format!("{}/{}", bucket, key)));
        }
        Ok(format!("memory://{}/{}?expires={}", bucket, key, expires_in.as_secs()))
    }

    async fn check_connectivity(&self, _bucket: &str) -> StorageResult<()> {
        Ok(())
    }
}
